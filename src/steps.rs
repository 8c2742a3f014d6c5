use crate::error::{LogsError, Result};
use crate::types::PlannedStep;
use k8s_openapi::api::core::v1::Pod;

/// Work out which containers to stream, and in what order.
///
/// Init containers are only included with `all_steps`. An explicit `steps`
/// filter keeps the computed order and silently drops names that match nothing.
pub fn plan(pod: &Pod, all_steps: bool, steps: &[String]) -> Result<Vec<PlannedStep>> {
    if all_steps && !steps.is_empty() {
        return Err(LogsError::incompatible_flags());
    }

    let Some(spec) = pod.spec.as_ref() else {
        return Ok(Vec::new());
    };

    let mut planned = Vec::new();
    if all_steps {
        planned.extend(
            spec.init_containers
                .iter()
                .flatten()
                .map(|c| PlannedStep::new(c.name.clone(), true)),
        );
    }
    planned.extend(
        spec.containers
            .iter()
            .map(|c| PlannedStep::new(c.name.clone(), false)),
    );

    if !steps.is_empty() {
        planned.retain(|step| steps.contains(&step.container));
    }

    Ok(planned)
}
