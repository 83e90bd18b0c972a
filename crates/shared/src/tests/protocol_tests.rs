use super::*;

#[test]
fn recognizes_bracketed_and_bare_markers() {
    assert_eq!(
        StreamMarker::recognize("<END_OF_THOUGHTS>"),
        Some(StreamMarker::EndOfThoughts)
    );
    assert_eq!(
        StreamMarker::recognize("END_OF_THOUGHTS"),
        Some(StreamMarker::EndOfThoughts)
    );
    assert_eq!(
        StreamMarker::recognize(" <<STREAM_END>>\n"),
        Some(StreamMarker::StreamEnd)
    );
    assert_eq!(
        StreamMarker::recognize("STREAM_END"),
        Some(StreamMarker::StreamEnd)
    );
    assert_eq!(StreamMarker::recognize("STREAM_END soon"), None);
}

#[test]
fn search_query_flags_follow_mode() {
    let query = SearchQuery::new("finance", SearchMode::Vector, 10);
    assert!(query.use_vector);
    assert!(!query.use_llm);
    let query = SearchQuery::new("finance", SearchMode::Keyword, 10);
    assert!(!query.use_vector && !query.use_llm);
}

#[test]
fn instruction_wire_ignores_unknown_top_level_keys() {
    let wire: FilterInstructionWire =
        serde_json::from_str(r#"{"filters":{"discipline":["IT"]},"confidence":0.9}"#)
            .expect("wire");
    let filters = wire.filters.expect("filters");
    assert_eq!(filters["discipline"], serde_json::json!(["IT"]));

    let wire: FilterInstructionWire = serde_json::from_str("{}").expect("empty wire");
    assert!(wire.filters.is_none());
}

#[test]
fn parses_search_modes() {
    assert_eq!("LLM".parse(), Ok(SearchMode::Llm));
    assert_eq!("semantic".parse(), Ok(SearchMode::Vector));
    assert!("fuzzy".parse::<SearchMode>().is_err());
}
