use super::*;
use crate::types::{SortField, SortOrder};
use serde_json::json;
use shared::domain::FacetKey;

fn catalog(count: i64) -> Catalog {
    let universities = ["NUS", "Monash University", "University of Sydney"];
    let records = (1..=count)
        .map(|id| {
            serde_json::from_value(json!({
                "data_id": id,
                "program_name": format!("Program {id:02}"),
                "university": universities[(id as usize) % universities.len()],
                "discipline": if id % 2 == 0 { "Business" } else { "Health" },
            }))
            .expect("record")
        })
        .collect();
    Catalog::from_records(records).expect("catalog")
}

fn ids(session: &SearchSession) -> Vec<i64> {
    session.view().iter().map(|record| record.id.0).collect()
}

#[test]
fn starts_with_the_whole_catalog_on_page_one() {
    let session = SearchSession::new(catalog(25), 10);
    assert_eq!(session.view().len(), 25);
    assert_eq!(session.pagination(), Pagination { page: 1, page_size: 10 });
    assert_eq!(session.status(), StreamingStatus::Idle);
}

#[test]
fn filter_change_on_page_three_returns_to_page_one() {
    let mut session = SearchSession::new(catalog(40), 5);
    session.set_page(3);

    let changed = session.set_filters(FilterState::new().with(FacetKey::Discipline, ["Business"]));

    assert!(changed);
    assert_eq!(session.pagination().page, 1);
    assert_eq!(session.view().len(), 20);
}

#[test]
fn page_size_change_on_page_three_keeps_the_page() {
    let mut session = SearchSession::new(catalog(40), 5);
    session.set_page(3);
    session.set_page_size(4).expect("page size");
    assert_eq!(session.pagination(), Pagination { page: 3, page_size: 4 });
    assert_eq!(session.set_page_size(0), Err(SearchError::InvalidPageSize));
}

#[test]
fn equal_filters_do_not_reset_or_recompute() {
    let mut session = SearchSession::new(catalog(30), 5);
    let filters = FilterState::new().with(FacetKey::Discipline, ["Health"]);
    session.set_filters(filters.clone());
    session.set_page(2);

    assert!(!session.set_filters(filters));
    assert_eq!(session.pagination().page, 2);
}

#[test]
fn search_text_change_resets_page_but_repeat_does_not() {
    let mut session = SearchSession::new(catalog(30), 5);
    session.begin_keyword("program");
    session.set_page(3);
    session.begin_keyword("program");
    assert_eq!(session.pagination().page, 3);

    session.begin_keyword("program 1");
    assert_eq!(session.pagination().page, 1);
    assert_eq!(ids(&session), (10..=19).collect::<Vec<_>>());
}

#[test]
fn keyword_search_combines_with_active_filters() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.set_filters(FilterState::new().with(FacetKey::University, ["NUS"]));
    session.begin_keyword("program 1");
    assert_eq!(ids(&session), vec![12]);
}

#[test]
fn entering_llm_clears_manual_filters_and_defers_the_view() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.set_filters(FilterState::new().with(FacetKey::University, ["NUS"]));
    let before = ids(&session);

    session.begin_llm("cheap business degrees");

    assert!(session.filters().is_empty());
    assert_eq!(session.status(), StreamingStatus::Thinking);
    assert_eq!(ids(&session), before);

    session.set_sort(SortState::new(SortField::ProgramName, SortOrder::Descending));
    assert_eq!(ids(&session), before);
}

#[test]
fn successful_instruction_replaces_filters_and_recomputes_once() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.begin_llm("business");
    session.finish_llm(Ok(FilterState::new().with(FacetKey::Discipline, ["Business"])));

    assert_eq!(session.status(), StreamingStatus::Closed);
    assert_eq!(ids(&session), vec![2, 4, 6, 8, 10, 12]);
    assert!(session.last_error().is_none());
}

#[test]
fn failed_instruction_leaves_the_unfiltered_view() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.set_filters(FilterState::new().with(FacetKey::University, ["NUS"]));
    session.begin_llm("business");
    session.finish_llm(Err(InstructionError::EmptyInstruction));

    assert_eq!(session.status(), StreamingStatus::Errored);
    assert_eq!(session.last_error(), Some("no filter instruction produced"));
    assert!(session.filters().is_empty());
    assert_eq!(session.view().len(), 12);
}

#[test]
fn ranked_results_keep_rank_order_under_filters() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.set_filters(FilterState::new().with(FacetKey::Discipline, ["Business"]));
    session.begin_vector("analytics");
    let ranked = [9, 4, 7, 2, 12]
        .into_iter()
        .map(|id| CatalogRecord::clone(&session.catalog().records()[id - 1]))
        .collect();

    session.apply_ranked(ranked, Some(BTreeMap::from([("vector".to_string(), 1.0)])));

    assert_eq!(ids(&session), vec![4, 2, 12]);
    assert_eq!(session.snapshot(String::new()).weights.map(|w| w.len()), Some(1));
}

#[test]
fn facet_change_while_ranked_search_is_pending_keeps_the_previous_base() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.begin_keyword("program 1");
    assert_eq!(ids(&session), vec![10, 11, 12]);

    session.begin_vector("analytics");
    session.set_filters(FilterState::new().with(FacetKey::Discipline, ["Business"]));
    assert_eq!(ids(&session), vec![10, 12]);

    session.fail_search("search backend unavailable".to_string());
    session.set_filters(FilterState::new());
    assert_eq!(ids(&session), vec![10, 11, 12]);
    assert_eq!(session.mode(), SearchMode::Vector);
}

#[test]
fn clearing_the_search_restores_keyword_mode() {
    let mut session = SearchSession::new(catalog(12), 10);
    session.begin_vector("analytics");
    session.apply_ranked(Vec::new(), None);
    assert!(session.view().is_empty());

    session.clear_search();

    assert_eq!(session.mode(), SearchMode::Keyword);
    assert_eq!(session.search_text(), "");
    assert_eq!(session.view().len(), 12);
}

#[test]
fn request_tokens_are_monotonic() {
    let mut session = SearchSession::new(catalog(1), 10);
    let first = session.next_request();
    let second = session.next_request();
    assert!(second > first);
    assert!(!session.is_current(first));
    assert!(session.is_current(second));
}

#[test]
fn current_page_slices_the_view() {
    let mut session = SearchSession::new(catalog(23), 10);
    session.set_page(3);
    let page = session.current_page();
    assert_eq!(page.page_count, 3);
    assert_eq!(page.items.len(), 3);
    assert_eq!(page.items[0].id.0, 21);
}
