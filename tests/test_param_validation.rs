use bhmm::{Corpus, Error, InferenceState, Model, ModelConfig, Schedule, TagMap, Trainer, Variant};

#[test]
fn test_hyperparameters_must_be_positive() {
    let mut config = ModelConfig::default();
    let hyper = config.hyper_mut();

    let result = hyper.set_alpha(0.0);
    assert_eq!(result.unwrap_err().to_string(), "alpha must be positive");

    let result = hyper.set_beta(-0.1);
    assert_eq!(result.unwrap_err().to_string(), "beta must be positive");

    let result = hyper.set_gamma(f64::INFINITY);
    assert_eq!(result.unwrap_err().to_string(), "gamma must be positive");

    let result = hyper.set_delta(0.0);
    assert_eq!(result.unwrap_err().to_string(), "delta must be positive");

    assert!(hyper.set_psi(Some(0.0)).is_err());
    assert!(hyper.set_psi(Some(0.5)).is_ok());
    assert_eq!(config.hyper().psi(), Some(0.5));
}

#[test]
fn test_morphology_parameters() {
    let mut config = ModelConfig::new(Variant::HDPHMM);
    let morphology = config.morphology_mut();
    assert!(morphology.set_stem_concentration(0.0).is_err());
    assert_eq!(
        morphology.set_stem_boundary(1.0).unwrap_err().to_string(),
        "stem boundary probability must be in (0, 1)"
    );
    assert!(morphology.set_affix_boundary(0.5).is_ok());
    assert_eq!(config.morphology().affix_boundary(), 0.5);
}

#[test]
fn test_schedule_validation() {
    assert!(Schedule::new(2.0, 0.1, 1.0).is_ok());
    assert!(Schedule::new(1.0, 0.0, 1.0).is_ok());
    assert_eq!(
        Schedule::new(1.0, 0.1, 0.0).unwrap_err().to_string(),
        "target temperature must be positive"
    );
    assert_eq!(
        Schedule::new(2.0, -0.5, 1.0).unwrap_err().to_string(),
        "temperature decrement must be positive"
    );
    assert!(ModelConfig::default().with_schedule(0.5, 0.1, 1.0).is_err());
}

#[test]
fn test_counts_validation() {
    assert_eq!(
        ModelConfig::default()
            .with_states(0, 0)
            .unwrap_err()
            .to_string(),
        "at least one non-boundary state is required"
    );
    assert_eq!(
        ModelConfig::default().with_topics(0).unwrap_err().to_string(),
        "topics must be at least 1"
    );
    assert_eq!(
        ModelConfig::default()
            .with_iterations(0)
            .unwrap_err()
            .to_string(),
        "iterations must be at least 1"
    );
    assert_eq!(
        ModelConfig::default()
            .with_sampling(5, 0)
            .unwrap_err()
            .to_string(),
        "lag must be at least 1"
    );
    // no samples needs no lag check beyond the setter
    assert!(ModelConfig::default().with_sampling(0, 1).is_ok());
}

#[test]
fn test_variant_names() {
    for (name, variant) in [
        ("m2", Variant::HMM),
        ("m3", Variant::BHMM),
        ("m4", Variant::CDHMM_SENTENCE),
        ("m5", Variant::LDAHMM),
        ("m6", Variant::CDHMM_DOCUMENT),
        ("m7", Variant::LDAHMM_DOCUMENT),
        ("m5s2", Variant::BHMM2),
        ("hdphmm", Variant::HDPHMM),
    ] {
        assert_eq!(name.parse::<Variant>().unwrap(), variant);
        let display = variant.to_string();
        assert_eq!(display.parse::<Variant>().unwrap(), variant);
    }
    assert_eq!(
        "m8".parse::<Variant>().unwrap_err().to_string(),
        "unknown model variant: m8"
    );
}

#[test]
fn test_supervision_validation() {
    let mut builder = Corpus::builder();
    builder
        .push_tagged_sentence(&["the", "dog"], &["DT", "NN"])
        .unwrap();
    let corpus = builder.build().unwrap();
    let map = TagMap::from_corpus(&corpus, |t| t == "NN").unwrap();

    let config = ModelConfig::new(Variant::LDAHMM).with_supervision(map.clone());
    assert_eq!(
        Trainer::new(config).unwrap_err().to_string(),
        "supervised training supports unified and bicameral emission only"
    );

    let mut config = ModelConfig::new(Variant::BHMM).with_supervision(map);
    config.set_states(5, 5).unwrap();
    assert_eq!(
        config.validate().unwrap_err().to_string(),
        "state counts do not match the supervision tag map"
    );

    let mut untagged = Corpus::builder();
    untagged.push_sentence(&["the", "dog"]).unwrap();
    let untagged = untagged.build().unwrap();
    assert!(TagMap::from_corpus(&untagged, |_| true).is_err());
}

#[test]
fn test_trainer_rejects_invalid_config() {
    let config = ModelConfig::new(Variant::LDAHMM).with_states(0, 2).unwrap();
    assert!(Trainer::new(config).is_err());
}

#[test]
fn test_import_rejects_invalid_hyperparameters() {
    let mut builder = Corpus::builder();
    builder.push_sentence(&["the", "dog", "barks"]).unwrap();
    builder.push_sentence(&["a", "cat", "sleeps"]).unwrap();
    let corpus = builder.build().unwrap();
    let config = ModelConfig::new(Variant::BHMM)
        .with_states(2, 1)
        .unwrap()
        .with_iterations(2)
        .unwrap();
    let model = Trainer::new(config).unwrap().train(&corpus).unwrap().export();

    for (field, value, message) in [
        ("beta", -5.0, "beta must be positive"),
        ("gamma", 0.0, "gamma must be positive"),
    ] {
        let mut json = serde_json::to_value(&model).unwrap();
        json["config"]["hyper"][field] = serde_json::json!(value);
        let tampered: Model = serde_json::from_value(json).unwrap();
        match InferenceState::import(&tampered) {
            Err(Error::InvalidConfig(msg)) => assert_eq!(msg, message),
            other => panic!("expected an invalid config, got {:?}", other.map(|_| ())),
        }
        assert!(tampered.tagger().is_err());
    }

    let mut json = serde_json::to_value(&model).unwrap();
    json["config"]["morphology"]["affix_boundary"] = serde_json::json!(0.0);
    let tampered: Model = serde_json::from_value(json).unwrap();
    assert_eq!(
        InferenceState::import(&tampered)
            .map(|_| ())
            .unwrap_err()
            .to_string(),
        "affix boundary probability must be in (0, 1)"
    );
}
