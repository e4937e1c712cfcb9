//! Integration test: batch prediction on the sample passengers

mod common;

use std::sync::Arc;
use titanic_automl::autopipeline::{ColumnInferencer, FittedPipeline, PipelineNode};
use titanic_automl::data::{sample_passengers, train_test_split, DataLoader, Passenger, ReclassificationRule};
use titanic_automl::error::AutoMlError;
use titanic_automl::inference::BatchPredictor;
use titanic_automl::optimizer::ParameterValue;
use titanic_automl::training::TrainerKind;

fn fitted_pipeline(trainer: TrainerKind) -> FittedPipeline {
    let (_dir, path) = common::write_passenger_csv(200);
    let inference = ColumnInferencer::new().infer_columns(&path, "Survived").unwrap();
    let mut roles = inference.column_roles.clone();
    roles.apply_overrides(&ReclassificationRule::passenger_defaults());

    let df = DataLoader::new(inference.loader_options.clone()).load(&path, &roles).unwrap();
    let split = train_test_split(&df, 0.2, 5).unwrap();

    let pipeline = PipelineNode::binary_classification(&TrainerKind::ALL);
    let mut params = pipeline.search_space().defaults();
    params.insert("one_of.0".into(), ParameterValue::String(trainer.as_str().into()));
    let plan = pipeline.resolve(&params).unwrap();
    plan.fit(&split.train_set, &roles, 9).unwrap()
}

fn predictor() -> BatchPredictor {
    BatchPredictor::new(Arc::new(fitted_pipeline(TrainerKind::FastTree)))
}

#[test]
fn test_sample_passengers_yield_three_results() {
    let outcomes = predictor().predict_batch(&sample_passengers());
    assert_eq!(outcomes.len(), 3);

    let ids: Vec<i64> = outcomes.iter().map(|o| o.passenger_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    for outcome in &outcomes {
        let p = outcome.result.as_ref().unwrap();
        assert!((0.0..=1.0).contains(&p.probability));
        assert_eq!(p.predicted_label, p.probability >= 0.5);
        assert!(outcome.to_string().starts_with(&format!("Id:{} Name:", p.passenger_id)));
    }
}

#[test]
fn test_every_trainer_scores_the_samples() {
    for trainer in TrainerKind::ALL {
        let predictor = BatchPredictor::new(Arc::new(fitted_pipeline(trainer)));
        let outcomes = predictor.predict_batch(&sample_passengers());
        assert_eq!(outcomes.len(), 3, "{}", trainer);
        assert!(outcomes.iter().all(|o| o.is_ok()), "{}", trainer);
    }
}

#[test]
fn test_empty_input() {
    assert!(predictor().predict_batch(&[]).is_empty());
}

#[test]
fn test_bad_record_is_isolated() {
    let mut batch: Vec<Passenger> = sample_passengers();
    let mut broken = batch[1].clone();
    broken.passenger_id = 99;
    broken.fare = f32::NAN;
    batch.insert(1, broken);
    let mut negative = batch[0].clone();
    negative.passenger_id = 100;
    negative.sib_sp = -1;
    batch.push(negative);

    let outcomes = predictor().predict_batch(&batch);
    let ids: Vec<i64> = outcomes.iter().map(|o| o.passenger_id).collect();
    assert_eq!(ids, vec![1, 99, 2, 3, 100]);

    let ok: Vec<bool> = outcomes.iter().map(|o| o.is_ok()).collect();
    assert_eq!(ok, vec![true, false, true, true, false]);
    match &outcomes[1].result {
        Err(AutoMlError::PredictionError { record_id, .. }) => assert_eq!(*record_id, 99),
        other => panic!("expected prediction error, got {:?}", other),
    }
}

#[test]
fn test_order_matches_input_for_large_batch() {
    let template = sample_passengers();
    let batch: Vec<Passenger> = (0..64)
        .map(|i| {
            let mut p = template[i % 3].clone();
            p.passenger_id = 1000 - i as i64;
            p.age = if i % 4 == 0 { None } else { Some(i as f32) };
            p
        })
        .collect();

    let outcomes = predictor().predict_batch(&batch);
    let expected: Vec<i64> = batch.iter().map(|p| p.passenger_id).collect();
    let got: Vec<i64> = outcomes.iter().map(|o| o.passenger_id).collect();
    assert_eq!(got, expected);
    assert!(outcomes.iter().all(|o| o.is_ok()));
}

#[test]
fn test_female_first_class_more_likely_to_survive() {
    let outcomes = predictor().predict_batch(&sample_passengers());
    let p_male_third = outcomes[0].result.as_ref().unwrap().probability;
    let p_female_first = outcomes[1].result.as_ref().unwrap().probability;
    assert!(p_female_first > p_male_third);
}
