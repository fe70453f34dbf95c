//! Pipeline fixtures for tests and benchmarks.

use crate::pipeline::{Pipeline, PipelineBuilder, StageSpec, StepSpec};

/// A single-step stage running `command`.
#[must_use]
pub fn command_stage(name: &str, command: &str) -> StageSpec {
    StageSpec::new(name).with_step(StepSpec::new(command))
}

/// Builds a pipeline from stages, panicking on invalid input.
///
/// # Panics
///
/// Panics if the stages do not form a valid pipeline.
#[must_use]
pub fn pipeline_of(name: &str, stages: impl IntoIterator<Item = StageSpec>) -> Pipeline {
    let mut builder = PipelineBuilder::new(name);
    for stage in stages {
        if let Err(err) = builder.add_stage(stage) {
            panic!("invalid fixture pipeline: {err}");
        }
    }
    match builder.build() {
        Ok(pipeline) => pipeline,
        Err(err) => panic!("invalid fixture pipeline: {err}"),
    }
}

/// The shape of a typical security-scan pipeline: checkout, SAST, SCA and
/// monitoring, each scanner stage contained.
#[must_use]
pub fn security_scan_pipeline() -> Pipeline {
    pipeline_of(
        "security-scan",
        [
            StageSpec::new("Checkout").with_step(StepSpec::new("git").with_args(["status"])),
            StageSpec::new("SAST")
                .with_step(
                    StepSpec::new("snyk.py")
                        .with_args(["--scan-for-push", "--repo-path", "./"]),
                )
                .contained(),
            StageSpec::new("SCA")
                .with_step(StepSpec::new("snyk_test.py").with_args(["--scan-for-push"]))
                .contained(),
            StageSpec::new("Monitor")
                .with_step(StepSpec::new("monitor.py"))
                .contained(),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Containment;

    #[test]
    fn test_security_scan_pipeline_shape() {
        let pipeline = security_scan_pipeline();
        assert_eq!(pipeline.stage_count(), 4);
        assert_eq!(pipeline.stages()[0].containment, Containment::None);
        assert!(pipeline.stages()[1..]
            .iter()
            .all(|s| s.containment.is_contained()));
    }

    #[test]
    #[should_panic(expected = "invalid fixture pipeline")]
    fn test_pipeline_of_rejects_duplicates() {
        let _ = pipeline_of("p", [command_stage("a", "true"), command_stage("a", "true")]);
    }
}
