use std::sync::Arc;

use async_trait::async_trait;
use promo_domain::{lookup_metric, Checkpoint, JobId, JobPlatform, JobSpec, JobState, MetricExtractor, MetricReading,
                   PipelineError, SearcherObjective};
use serde_json::{json, Value};

fn checkpoint(metrics: Value, searcher: Value) -> Checkpoint {
    Checkpoint { uuid: "ckpt-1".into(),
                 job_id: JobId::new("1"),
                 metrics,
                 experiment_config: json!({ "searcher": searcher }) }
}

#[test]
fn metric_found_under_snake_case_container() {
    let m = json!({"validation_metrics": {"validation_loss": 0.02}});
    assert_eq!(lookup_metric(&m, "validation_loss"), Some(0.02));
}

#[test]
fn metric_found_under_camel_case_container() {
    let m = json!({"validationMetrics": {"validation_loss": 0.03}});
    assert_eq!(lookup_metric(&m, "validation_loss"), Some(0.03));
}

#[test]
fn first_container_wins_and_non_numeric_falls_through() {
    let both = json!({"validation_metrics": {"acc": 0.9}, "validationMetrics": {"acc": 0.1}});
    assert_eq!(lookup_metric(&both, "acc"), Some(0.9));
    let first_bad = json!({"validation_metrics": {"acc": "n/a"}, "validationMetrics": {"acc": 0.1}});
    assert_eq!(lookup_metric(&first_bad, "acc"), Some(0.1));
}

#[test]
fn metric_missing_from_both_containers_is_not_found() {
    let ck = checkpoint(json!({"validation_metrics": {"other": 1.0}, "trainingMetrics": {"validation_loss": 1.0}}),
                        json!({"metric": "validation_loss", "smaller_is_better": true}));
    let err = MetricReading::from_checkpoint(ck).unwrap_err();
    assert_eq!(err,
               PipelineError::MetricNotFound { metric: "validation_loss".into(),
                                               checkpoint: "ckpt-1".into() });
    assert_eq!(err.kind(), "MetricNotFoundError");
}

#[test]
fn searcher_objective_is_read_from_experiment_config() {
    let obj = SearcherObjective::from_experiment_config(&json!({"searcher": {"metric": "accuracy", "smaller_is_better": false}}))
        .unwrap();
    assert_eq!(obj.metric, "accuracy");
    assert!(!obj.smaller_is_better);

    let defaulted = SearcherObjective::from_experiment_config(&json!({"searcher": {"metric": "loss"}})).unwrap();
    assert!(defaulted.smaller_is_better);

    for bad in [json!({}),
                json!({"searcher": {"smaller_is_better": true}}),
                json!({"searcher": {"metric": "loss", "smaller_is_better": "yes"}})]
    {
        assert!(matches!(SearcherObjective::from_experiment_config(&bad),
                         Err(PipelineError::InvalidSearcherConfig(_))));
    }
}

struct OneCheckpoint(Checkpoint);

#[async_trait]
impl JobPlatform for OneCheckpoint {
    async fn submit(&self, _spec: &JobSpec) -> Result<JobId, PipelineError> {
        Ok(self.0.job_id.clone())
    }

    async fn state(&self, _job: &JobId) -> Result<JobState, PipelineError> {
        Ok(JobState::Completed)
    }

    async fn top_checkpoint(&self, job: &JobId) -> Result<Checkpoint, PipelineError> {
        if *job == self.0.job_id {
            Ok(self.0.clone())
        } else {
            Err(PipelineError::JobStatusUnavailable(format!("unknown job {job}")))
        }
    }
}

#[tokio::test]
async fn extractor_reads_top_checkpoint_of_job() {
    let ck = checkpoint(json!({"validationMetrics": {"validation_loss": 0.02}}),
                        json!({"metric": "validation_loss", "smaller_is_better": true}));
    let extractor = MetricExtractor::new(Arc::new(OneCheckpoint(ck.clone())));
    let reading = extractor.best_metric(&JobId::new("1")).await.unwrap();
    assert_eq!(reading.name, "validation_loss");
    assert_eq!(reading.value, 0.02);
    assert!(reading.smaller_is_better);
    assert_eq!(reading.checkpoint, ck);

    assert!(extractor.best_metric(&JobId::new("2")).await.is_err());
}
