//! Join plans: which relations join on which columns, in which order.
//!
//! A plan is a list of stages. Each stage names its two inputs (a parsed
//! table or the output of an earlier stage), the key column on each side and
//! an optional projection of the joined tuple. Every input and every stage
//! output is consumed exactly once; the last stage produces the result.

use crate::error::{Error, Result};

/// Where a stage takes one of its inputs from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// The i-th input table.
    Input(usize),
    /// The output of an earlier stage.
    Stage(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinStage {
    pub left: Source,
    pub right: Source,
    pub left_key: usize,
    pub right_key: usize,
    /// Output column `i` is joined column `projection[i]`.
    pub projection: Option<Vec<usize>>,
}

impl JoinStage {
    /// Joins on column 0 of both sides and keeps the joined layout.
    pub fn new(left: Source, right: Source) -> Self {
        Self {
            left,
            right,
            left_key: 0,
            right_key: 0,
            projection: None,
        }
    }

    pub fn with_keys(mut self, left_key: usize, right_key: usize) -> Self {
        self.left_key = left_key;
        self.right_key = right_key;
        self
    }

    pub fn with_projection(mut self, projection: Vec<usize>) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Arity after the join: both sides minus the right key.
    pub fn joined_arity(&self, left_arity: usize, right_arity: usize) -> usize {
        left_arity + right_arity - 1
    }

    pub fn output_arity(&self, left_arity: usize, right_arity: usize) -> usize {
        match &self.projection {
            Some(p) => p.len(),
            None => self.joined_arity(left_arity, right_arity),
        }
    }
}

/// Projection that swaps columns `a` and `b` of an `arity`-wide tuple.
pub fn swap(arity: usize, a: usize, b: usize) -> Vec<usize> {
    let mut columns: Vec<usize> = (0..arity).collect();
    columns.swap(a, b);
    columns
}

/// Projection that moves column `key` to the front, keeping the rest in order.
pub fn key_first(arity: usize, key: usize) -> Vec<usize> {
    std::iter::once(key)
        .chain((0..arity).filter(|&c| c != key))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinPlan {
    stages: Vec<JoinStage>,
}

impl JoinPlan {
    pub fn new(stages: Vec<JoinStage>) -> Self {
        Self { stages }
    }

    /// The four-table left-deep plan over tables `T0..T3`:
    ///
    /// ```text
    ///  J1 = T1 ⋈ T2            (k, T1.p, T2.p)
    ///  J2 = T0 ⋈ J1, swap 0↔3  (T2.p, T0.p, T1.p, k)
    ///  J3 = T3 ⋈ J2, swap 1↔4  (T2.p, k, T0.p, T1.p, T3.p)
    /// ```
    ///
    /// The third join matches T3's key against T2's payload.
    pub fn four_way() -> Self {
        Self::new(vec![
            JoinStage::new(Source::Input(1), Source::Input(2)),
            JoinStage::new(Source::Input(0), Source::Stage(0)).with_projection(swap(4, 0, 3)),
            JoinStage::new(Source::Input(3), Source::Stage(1)).with_projection(swap(5, 1, 4)),
        ])
    }

    pub fn stages(&self) -> &[JoinStage] {
        &self.stages
    }

    /// Checks the plan against the arities of its inputs and returns the
    /// arity of the final result. Also reports inputs the plan never reads.
    pub fn validate(&self, input_arities: &[usize]) -> Result<PlanShape> {
        if self.stages.is_empty() {
            return Err(Error::plan(0, "plan has no stages"));
        }

        let mut input_used = vec![false; input_arities.len()];
        let mut stage_used = vec![false; self.stages.len()];
        let mut stage_arity = Vec::with_capacity(self.stages.len());

        for (i, stage) in self.stages.iter().enumerate() {
            let mut side_arity = |source: Source, key: usize| -> Result<usize> {
                let (used, arity) = match source {
                    Source::Input(n) if n < input_arities.len() => {
                        (&mut input_used[n], input_arities[n])
                    }
                    Source::Input(n) => {
                        return Err(Error::plan(i, format!("input {n} does not exist")));
                    }
                    Source::Stage(s) if s < i => (&mut stage_used[s], stage_arity[s]),
                    Source::Stage(s) => {
                        return Err(Error::plan(i, format!("stage {s} is not an earlier stage")));
                    }
                };
                if *used {
                    return Err(Error::plan(i, format!("{source:?} is consumed twice")));
                }
                *used = true;
                if key >= arity {
                    return Err(Error::plan(
                        i,
                        format!("key column {key} out of range for {source:?} of arity {arity}"),
                    ));
                }
                Ok(arity)
            };
            let left = side_arity(stage.left, stage.left_key)?;
            let right = side_arity(stage.right, stage.right_key)?;

            let joined = stage.joined_arity(left, right);
            if let Some(projection) = &stage.projection {
                if projection.is_empty() {
                    return Err(Error::plan(i, "projection keeps no columns"));
                }
                if let Some(&c) = projection.iter().find(|&&c| c >= joined) {
                    return Err(Error::plan(
                        i,
                        format!("projection column {c} out of range for arity {joined}"),
                    ));
                }
            }
            stage_arity.push(stage.output_arity(left, right));
        }

        let last = self.stages.len() - 1;
        if let Some(s) = stage_used[..last].iter().position(|used| !used) {
            return Err(Error::plan(s, "stage output is never consumed"));
        }

        Ok(PlanShape {
            output_arity: stage_arity[last],
            unused_inputs: input_used
                .iter()
                .enumerate()
                .filter(|&(_, used)| !used)
                .map(|(n, _)| n)
                .collect(),
        })
    }
}

impl Default for JoinPlan {
    fn default() -> Self {
        Self::four_way()
    }
}

/// What validation learned about a plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanShape {
    pub output_arity: usize,
    pub unused_inputs: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_error(plan: &JoinPlan, arities: &[usize]) -> (usize, String) {
        match plan.validate(arities) {
            Err(Error::InvalidPlan { stage, reason }) => (stage, reason),
            other => panic!("expected invalid plan, got {other:?}"),
        }
    }

    #[test]
    fn four_way_shape() {
        let shape = JoinPlan::four_way().validate(&[2, 2, 2, 2]).unwrap();
        assert_eq!(shape.output_arity, 5);
        assert!(shape.unused_inputs.is_empty());
    }

    #[test]
    fn projection_helpers() {
        assert_eq!(swap(4, 0, 3), vec![3, 1, 2, 0]);
        assert_eq!(swap(5, 1, 4), vec![0, 4, 2, 3, 1]);
        assert_eq!(key_first(4, 2), vec![2, 0, 1, 3]);
        assert_eq!(key_first(3, 0), vec![0, 1, 2]);
    }

    #[test]
    fn reject_empty_plan() {
        assert_eq!(plan_error(&JoinPlan::new(vec![]), &[2]).0, 0);
    }

    #[test]
    fn reject_missing_input() {
        let plan = JoinPlan::new(vec![JoinStage::new(Source::Input(0), Source::Input(5))]);
        let (stage, reason) = plan_error(&plan, &[2, 2]);
        assert_eq!(stage, 0);
        assert!(reason.contains("input 5"));
    }

    #[test]
    fn reject_forward_stage_reference() {
        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Stage(1)),
            JoinStage::new(Source::Input(1), Source::Input(2)),
        ]);
        assert_eq!(plan_error(&plan, &[2, 2, 2]).0, 0);
    }

    #[test]
    fn reject_double_consumption() {
        let plan = JoinPlan::new(vec![JoinStage::new(Source::Input(0), Source::Input(0))]);
        assert!(plan_error(&plan, &[2]).1.contains("twice"));

        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)),
            JoinStage::new(Source::Stage(0), Source::Input(2)),
            JoinStage::new(Source::Stage(0), Source::Stage(1)),
        ]);
        assert_eq!(plan_error(&plan, &[2, 2, 2]).0, 2);
    }

    #[test]
    fn reject_key_out_of_range() {
        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)).with_keys(0, 2),
        ]);
        assert!(plan_error(&plan, &[2, 2]).1.contains("key column 2"));
    }

    #[test]
    fn reject_bad_projection() {
        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)).with_projection(vec![0, 3]),
        ]);
        assert!(plan_error(&plan, &[2, 2]).1.contains("projection column 3"));

        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)).with_projection(vec![]),
        ]);
        assert!(plan_error(&plan, &[2, 2]).1.contains("no columns"));
    }

    #[test]
    fn reject_dangling_stage() {
        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)),
            JoinStage::new(Source::Input(2), Source::Input(3)),
        ]);
        let (stage, reason) = plan_error(&plan, &[2, 2, 2, 2]);
        assert_eq!(stage, 0);
        assert!(reason.contains("never consumed"));
    }

    #[test]
    fn report_unused_inputs() {
        let plan = JoinPlan::new(vec![JoinStage::new(Source::Input(0), Source::Input(2))]);
        let shape = plan.validate(&[2, 2, 2, 2]).unwrap();
        assert_eq!(shape.unused_inputs, vec![1, 3]);
        assert_eq!(shape.output_arity, 3);
    }

    #[test]
    fn projection_changes_output_arity() {
        let plan = JoinPlan::new(vec![
            JoinStage::new(Source::Input(0), Source::Input(1)).with_projection(vec![2, 1]),
            JoinStage::new(Source::Stage(0), Source::Input(2)),
        ]);
        assert_eq!(plan.validate(&[2, 2, 2]).unwrap().output_arity, 3);
    }
}
