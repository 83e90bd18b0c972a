use super::*;
use serde_json::json;
use shared::domain::ProgramId;

fn record(id: i64, name: &str, university: &str, discipline: &str, fee: Option<u64>) -> CatalogRecord {
    let mut value = json!({
        "data_id": id,
        "program_name": name,
        "university": university,
        "discipline": discipline,
        "academic_level": "Postgraduate",
    });
    if let Some(fee) = fee {
        value["international_total_fee"] = json!({"fee_lower": fee, "fee_upper": fee + 5000});
        value["domestic_total_fee"] = json!({"fee_lower": fee / 2, "fee_upper": fee / 2 + 1000});
    }
    serde_json::from_value(value).expect("record")
}

fn catalog() -> Vec<CatalogRecord> {
    vec![
        record(1, "Master of Nursing", "Monash University", "Health", Some(95_000)),
        record(2, "Master of Business Analytics", "Monash University", "Business", Some(100_000)),
        record(3, "Master of Laws", "University of Sydney", "Law", Some(149_999)),
        record(4, "Bachelor of Data Science", "University of Sydney", "IT", None),
        record(5, "Master of Public Health", "Deakin University", "Health", Some(210_000)),
        record(6, "Graduate Diploma", "Deakin University", "", Some(150_000)),
    ]
}

fn ids(records: &[CatalogRecord]) -> Vec<i64> {
    records.iter().map(|record| record.id.0).collect()
}

#[test]
fn no_filters_and_no_keyword_is_identity() {
    let records = catalog();
    assert_eq!(apply_filters(&records, "", &FilterState::new()), records);
}

#[test]
fn empty_catalog_yields_empty_view() {
    let records: Vec<CatalogRecord> = Vec::new();
    let filters = FilterState::new().with(FacetKey::Discipline, ["Health"]);
    assert!(apply_filters(&records, "health", &filters).is_empty());
}

#[test]
fn keyword_matches_name_university_or_discipline_case_insensitively() {
    let records = catalog();
    assert_eq!(ids(&apply_filters(&records, "MONASH", &FilterState::new())), vec![1, 2]);
    assert_eq!(ids(&apply_filters(&records, "health", &FilterState::new())), vec![1, 5]);
    assert_eq!(ids(&apply_filters(&records, "laws", &FilterState::new())), vec![3]);
}

#[test]
fn facets_are_anded_and_values_within_a_facet_are_ored() {
    let records = catalog();
    let filters = FilterState::new()
        .with(FacetKey::Discipline, ["Health", "Law"])
        .with(FacetKey::University, ["Deakin University", "University of Sydney"]);
    assert_eq!(ids(&apply_filters(&records, "", &filters)), vec![3, 5]);
}

#[test]
fn absent_facet_values_never_match() {
    let records = catalog();
    let filters = FilterState::new().with(FacetKey::SubDiscipline, ["Nursing"]);
    assert!(apply_filters(&records, "", &filters).is_empty());

    let filters = FilterState::new().with(FacetKey::Discipline, ["Health", "Business", "Law", "IT"]);
    assert_eq!(ids(&apply_filters(&records, "", &filters)), vec![1, 2, 3, 4, 5]);
}

#[test]
fn fee_buckets_are_half_open_on_the_international_lower_bound() {
    let records = catalog();
    let under = FilterState::new().with(FacetKey::FeeRange, ["0-100000"]);
    assert_eq!(ids(&apply_filters(&records, "", &under)), vec![1]);

    let middle = FilterState::new().with(FacetKey::FeeRange, ["100000-150000", "150000-200000"]);
    assert_eq!(ids(&apply_filters(&records, "", &middle)), vec![2, 3, 6]);

    let top = FilterState::new().with(FacetKey::FeeRange, ["200000-999999999"]);
    assert_eq!(ids(&apply_filters(&records, "", &top)), vec![5]);
}

#[test]
fn filtering_is_idempotent_and_monotonic() {
    let records = catalog();
    let loose = FilterState::new().with(FacetKey::University, ["Monash University", "Deakin University"]);
    let strict = loose.clone().with(FacetKey::Discipline, ["Health"]);

    let once = apply_filters(&records, "master", &loose);
    let twice = apply_filters(&once, "master", &loose);
    assert_eq!(once, twice);

    let narrowed = apply_filters(&records, "master", &strict);
    assert!(narrowed.len() <= once.len());
    assert!(narrowed.iter().all(|record| once.contains(record)));
}

#[test]
fn sorter_is_a_no_op_without_field_or_order() {
    let records = catalog();
    let unsorted = apply_sorter(records.clone(), SortState::default());
    assert_eq!(unsorted, records);

    let half = SortState {
        field: Some(SortField::ProgramName),
        order: None,
    };
    assert_eq!(apply_sorter(records.clone(), half), records);
}

#[test]
fn sorter_orders_names_with_collation() {
    let sorted = apply_sorter(
        catalog(),
        SortState::new(SortField::ProgramName, SortOrder::Ascending),
    );
    assert_eq!(ids(&sorted), vec![4, 6, 2, 3, 1, 5]);
}

#[test]
fn sorter_is_stable_for_equal_keys() {
    let ascending = apply_sorter(
        catalog(),
        SortState::new(SortField::University, SortOrder::Ascending),
    );
    assert_eq!(ids(&ascending), vec![5, 6, 1, 2, 3, 4]);

    let descending = apply_sorter(
        catalog(),
        SortState::new(SortField::University, SortOrder::Descending),
    );
    assert_eq!(ids(&descending), vec![3, 4, 1, 2, 5, 6]);
}

#[test]
fn fee_sort_is_numeric_with_absent_fees_first() {
    let sorted = apply_sorter(
        catalog(),
        SortState::new(SortField::InternationalFee, SortOrder::Ascending),
    );
    assert_eq!(ids(&sorted), vec![4, 1, 2, 3, 6, 5]);

    let domestic = apply_sorter(
        catalog(),
        SortState::new(SortField::DomesticFee, SortOrder::Descending),
    );
    assert_eq!(ids(&domestic), vec![5, 6, 3, 2, 1, 4]);
}

#[test]
fn facet_options_come_from_the_whole_catalog() {
    let records = catalog();
    let options = facet_options(&records);
    assert_eq!(
        options.get(FacetKey::Discipline),
        ["Business", "Health", "IT", "Law"]
    );
    assert_eq!(
        options.get(FacetKey::University),
        ["Deakin University", "Monash University", "University of Sydney"]
    );
    assert!(options.get(FacetKey::SubDiscipline).is_empty());
    assert_eq!(
        options.get(FacetKey::FeeRange),
        ["0-100000", "100000-150000", "150000-200000", "200000-999999999"]
    );

    let filtered = apply_filters(
        &records,
        "",
        &FilterState::new().with(FacetKey::Discipline, ["Law"]),
    );
    assert_eq!(filtered.len(), 1);
    assert_eq!(facet_options(&records), options);
}

#[test]
fn facet_options_are_listed_under_their_own_key() {
    let options = facet_options(&catalog());
    let keys: Vec<FacetKey> = options.iter().map(|(key, _)| key).collect();
    assert_eq!(keys, FacetKey::ALL.to_vec());
    for (key, values) in options.iter() {
        assert_eq!(values, options.get(key));
    }
    assert_eq!(options.get(FacetKey::AcademicLevel), ["Postgraduate"]);
    assert!(options.get(FacetKey::ProgrammeType).is_empty());
}

#[test]
fn university_sort_places_stroked_letters_with_their_base_letter() {
    let records = vec![
        record(1, "Master of Arts", "Zurich University", "Arts", None),
        record(2, "Master of Arts", "Łódź University", "Arts", None),
        record(3, "Master of Arts", "Oslo University", "Arts", None),
        record(4, "Master of Arts", "Aarhus University", "Arts", None),
    ];
    let sorted = apply_sorter(
        records,
        SortState::new(SortField::University, SortOrder::Ascending),
    );
    assert_eq!(ids(&sorted), vec![4, 2, 3, 1]);
}

#[test]
fn selection_rebuild_populates_every_key() {
    let state = build_filter_state_from_selection(&json!({
        "discipline": ["Health"],
        "subDiscipline": null,
        "university": "Monash University",
        "academic_level": 7,
        "programme_type": ["Coursework", 3],
        "fee_range": ["100000–150000", "cheap"],
        "campus": ["Clayton"],
    }));

    assert_eq!(state.get(FacetKey::Discipline).len(), 1);
    assert!(state.get(FacetKey::SubDiscipline).is_empty());
    assert!(state.get(FacetKey::University).contains("Monash University"));
    assert!(state.get(FacetKey::AcademicLevel).is_empty());
    assert!(state.get(FacetKey::ProgrammeType).is_empty());
    assert_eq!(
        state.get(FacetKey::FeeRange).iter().collect::<Vec<_>>(),
        vec!["100000-150000"]
    );
}

#[test]
fn non_object_selection_is_empty() {
    assert_eq!(build_filter_state_from_selection(&json!([1, 2])), FilterState::new());
    assert_eq!(build_filter_state_from_selection(&Value::Null), FilterState::new());
}

#[test]
fn paginate_slices_one_based_pages() {
    let records = catalog();
    let first = paginate(&records, Pagination { page: 1, page_size: 4 });
    assert_eq!(first.page_count, 2);
    assert_eq!(first.total, 6);
    assert_eq!(ids(&first.items), vec![1, 2, 3, 4]);

    let second = paginate(&records, Pagination { page: 2, page_size: 4 });
    assert_eq!(ids(&second.items), vec![5, 6]);

    let beyond = paginate(&records, Pagination { page: 3, page_size: 4 });
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.page_count, 2);
}

#[test]
fn records_are_addressable_by_id_after_filtering() {
    let records = catalog();
    let filtered = apply_filters(&records, "sydney", &FilterState::new());
    assert!(filtered.iter().all(|record| record.id != ProgramId(1)));
}
