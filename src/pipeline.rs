//! Runs a join plan over parsed tables and writes the result.
//!
//! Ownership flows through the plan: each stage takes its two inputs out of
//! their slots, joins them and stores its output for the stage that reads it.
//! Inputs are dropped as soon as their stage has produced its output.

use std::io::Write;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::config::JoinConfig;
use crate::error::{Error, Result};
use crate::join::hash_join;
use crate::output::write_relation;
use crate::plan::{JoinPlan, Source, key_first};
use crate::span::Relation;
use crate::table::Table;

/// Executes `plan` over `inputs` and returns the last stage's output.
pub fn execute(plan: &JoinPlan, inputs: Vec<Relation>, bucket_shift: u32) -> Result<Relation> {
    let arities: Vec<usize> = inputs.iter().map(Relation::arity).collect();
    let shape = plan.validate(&arities)?;
    if !shape.unused_inputs.is_empty() {
        warn!(unused = ?shape.unused_inputs, "join plan ignores some inputs");
    }

    let mut inputs: Vec<Option<Relation>> = inputs.into_iter().map(Some).collect();
    let mut outputs: Vec<Option<Relation>> = Vec::with_capacity(plan.stages().len());

    for (i, stage) in plan.stages().iter().enumerate() {
        let mut take = |source: Source| -> Result<Relation> {
            let slot = match source {
                Source::Input(n) => inputs.get_mut(n),
                Source::Stage(s) => outputs.get_mut(s),
            };
            slot.and_then(Option::take)
                .ok_or_else(|| Error::plan(i, format!("{source:?} is not available")))
        };
        let left = take(stage.left)?;
        let right = take(stage.right)?;

        let left = bring_key_first(left, stage.left_key)?;
        let right = bring_key_first(right, stage.right_key)?;

        let mut joined = hash_join(left, right, bucket_shift)?;
        if let Some(projection) = &stage.projection {
            joined = joined.project(projection)?;
        }
        debug!(stage = i, rows = joined.len(), arity = joined.arity(), "stage done");
        outputs.push(Some(joined));
    }

    outputs
        .pop()
        .flatten()
        .ok_or_else(|| Error::plan(plan.stages().len(), "plan produced no output"))
}

fn bring_key_first(relation: Relation, key: usize) -> Result<Relation> {
    if key == 0 {
        return Ok(relation);
    }
    let arity = relation.arity();
    relation.project(&key_first(arity, key))
}

/// Reads and parses every input. All files are attempted; the first failure
/// is returned after every failure has been logged.
pub fn load_tables<P: AsRef<Path>>(paths: &[P], config: &JoinConfig) -> Result<Vec<Relation>> {
    let mut relations = Vec::with_capacity(paths.len());
    let mut first_error = None;

    for path in paths {
        let path = path.as_ref();
        match Table::read(path, &config.scanner) {
            Ok(table) => {
                debug!(path = %path.display(), rows = table.len(), "loaded table");
                relations.push(table.into_relation());
            }
            Err(err) => {
                error!(path = %path.display(), %err, "failed to load table");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(relations),
    }
}

/// Loads `paths`, runs the configured plan and writes the rows to `out`.
/// Returns the number of rows written.
pub fn run<P: AsRef<Path>, W: Write>(
    paths: &[P],
    config: &JoinConfig,
    out: &mut W,
) -> Result<usize> {
    info!(inputs = paths.len(), scanner = config.scanner.name(), "starting join");
    let inputs = load_tables(paths, config)?;
    let result = execute(&config.plan, inputs, config.bucket_shift)?;
    write_relation(&result, out)?;
    info!(rows = result.len(), "join finished");
    Ok(result.len())
}
