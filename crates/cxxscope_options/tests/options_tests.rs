use cxxscope_options::{parse_options, parse_options_file, AnalysisOptions, Language, OptionsError};

#[test]
fn test_empty_object_gives_defaults() {
    let options = parse_options("{}").unwrap();
    assert_eq!(options, AnalysisOptions::default());
    assert_eq!(options.language, Language::Cxx);
    assert!(options.search_base_classes);
    assert!(!options.extended_constant_folding);
    assert!(options.resolve_calls);
    assert!(options.report_member_access);
    assert_eq!(options.max_nesting_depth, 256);
    assert!(options.binds_symbols());
}

#[test]
fn test_camel_case_keys() {
    let options = parse_options(
        r#"{
            "language": "c",
            "searchBaseClasses": false,
            "extendedConstantFolding": true,
            "resolveCalls": false,
            "reportMemberAccess": false,
            "maxNestingDepth": 64
        }"#,
    )
    .unwrap();
    assert_eq!(options.language, Language::C);
    assert!(!options.is_cxx());
    assert!(!options.search_base_classes);
    assert!(options.extended_constant_folding);
    assert!(!options.resolve_calls);
    assert!(!options.report_member_access);
    assert_eq!(options.max_nesting_depth, 64);
}

#[test]
fn test_language_none_skips_binding() {
    let options = parse_options(r#"{ "language": "none" }"#).unwrap();
    assert!(!options.binds_symbols());
}

#[test]
fn test_rejects_bad_input() {
    assert!(matches!(parse_options(r#"{ "language": "java" }"#), Err(OptionsError::Json(_))));
    assert!(matches!(parse_options(r#"{ "resolve_calls": false }"#), Err(OptionsError::Json(_))));
    assert!(matches!(parse_options("[1, 2]"), Err(OptionsError::Json(_))));
    assert!(matches!(
        parse_options(r#"{ "maxNestingDepth": 0 }"#),
        Err(OptionsError::Invalid { field: "maxNestingDepth", .. })
    ));
}

#[test]
fn test_missing_file() {
    let err = parse_options_file("/nonexistent/cxxscope.json").unwrap_err();
    assert!(matches!(err, OptionsError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/cxxscope.json"));
}

#[test]
fn test_options_serialize_back() {
    let json = serde_json::to_string(&AnalysisOptions::default()).unwrap();
    assert!(json.contains("\"searchBaseClasses\":true"));
    assert!(json.contains("\"language\":\"cxx\""));
    assert_eq!(parse_options(&json).unwrap(), AnalysisOptions::default());
}
