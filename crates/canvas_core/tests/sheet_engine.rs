use canvas_core::sheet::parser::{MAX_FORMULA_TOKENS, MAX_NESTING_DEPTH};
use canvas_core::sheet::{coords_to_address, range_address, CellAddr, SheetEngine};
use chrono::{TimeZone, Utc};

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

#[test]
fn formulas_evaluate_against_sibling_cells() {
    let mut engine = SheetEngine::new();
    engine.update_sheet(
        "t1",
        &grid(&[&["Q1", "Q2"], &["10", "20"], &["=A2+B2", "=A2*2"]]),
    );

    assert_eq!(engine.get_computed_value("t1", 2, 0), "30");
    assert_eq!(engine.get_computed_value("t1", 2, 1), "20");
    assert_eq!(engine.get_computed_value("t1", 0, 0), "Q1");
}

#[test]
fn semicolon_separators_evaluate_like_commas() {
    let mut engine = SheetEngine::new();
    engine.update_sheet(
        "t1",
        &grid(&[&["4", "5"], &["=SUM(A1;B1)", "=SUM(A1,B1)"]]),
    );

    assert_eq!(engine.get_computed_value("t1", 1, 0), "9");
    assert_eq!(
        engine.get_computed_value("t1", 1, 0),
        engine.get_computed_value("t1", 1, 1)
    );
}

#[test]
fn repeated_update_with_same_grid_is_idempotent() {
    let source = grid(&[&["a", "=1/3"], &["=B1*3", "=A2&\"x\""]]);

    let mut once = SheetEngine::new();
    once.update_sheet("t", &source);
    let mut twice = SheetEngine::new();
    twice.update_sheet("t", &source);
    twice.update_sheet("t", &source);

    assert_eq!(
        once.get_computed_data("t", 2, 2),
        twice.get_computed_data("t", 2, 2)
    );
    assert_eq!(twice.sheet_count(), 1);
}

#[test]
fn missing_sheets_and_coordinates_read_as_empty() {
    let mut engine = SheetEngine::new();
    engine.update_sheet("t", &grid(&[&["1"]]));

    assert_eq!(engine.get_computed_value("nope", 0, 0), "");
    assert_eq!(engine.get_computed_value("t", 5, 5), "");
    assert!(engine.get_computed_data("nope", 3, 3).is_empty());
    assert_eq!(
        engine.get_computed_data("t", 2, 2),
        grid(&[&["1", ""], &["", ""]])
    );
}

#[test]
fn bad_formulas_only_affect_their_own_cell() {
    let mut engine = SheetEngine::new();
    engine.update_sheet("bad", &grid(&[&["=1/0", "=FOO(1)", "=1+", "5", "=D1*2"]]));
    engine.update_sheet("good", &grid(&[&["=2+2"]]));

    assert_eq!(engine.get_computed_value("bad", 0, 0), "#DIV/0!");
    assert_eq!(engine.get_computed_value("bad", 0, 1), "#NAME?");
    assert_eq!(engine.get_computed_value("bad", 0, 2), "#ERROR!");
    assert_eq!(engine.get_computed_value("bad", 0, 4), "10");
    assert_eq!(engine.get_computed_value("good", 0, 0), "4");
}

#[test]
fn pathologically_nested_cells_become_errors_in_place() {
    let deep_sign = format!("={}1", "-".repeat(200_000));
    let deep_parens = format!(
        "={}1{}",
        "(".repeat(MAX_NESTING_DEPTH + 1),
        ")".repeat(MAX_NESTING_DEPTH + 1)
    );
    let long_chain = format!("={}", vec!["A1"; MAX_FORMULA_TOKENS].join("+"));
    let mut engine = SheetEngine::new();
    engine.update_sheet(
        "t",
        &[vec![
            "2".to_string(),
            deep_sign,
            deep_parens,
            long_chain,
            "=A1*3".to_string(),
        ]],
    );

    assert_eq!(engine.get_computed_value("t", 0, 1), "#ERROR!");
    assert_eq!(engine.get_computed_value("t", 0, 2), "#ERROR!");
    assert_eq!(engine.get_computed_value("t", 0, 3), "#ERROR!");
    assert_eq!(engine.get_computed_value("t", 0, 4), "6");
}

#[test]
fn nesting_up_to_the_limit_still_evaluates() {
    let nested = format!(
        "={}A1{}",
        "(".repeat(MAX_NESTING_DEPTH),
        ")".repeat(MAX_NESTING_DEPTH)
    );
    let chain = format!("={}", vec!["A1"; MAX_FORMULA_TOKENS / 2].join("+"));
    let mut engine = SheetEngine::new();
    engine.update_sheet("t", &[vec!["1".to_string(), nested, chain]]);

    assert_eq!(engine.get_computed_value("t", 0, 1), "1");
    assert_eq!(
        engine.get_computed_value("t", 0, 2),
        (MAX_FORMULA_TOKENS / 2).to_string()
    );
}

#[test]
fn circular_references_are_flagged_only_on_the_cycle() {
    let mut engine = SheetEngine::new();
    engine.update_sheet("t", &grid(&[&["=B1", "=A1", "3", "=C1+1"]]));

    assert_eq!(engine.get_computed_value("t", 0, 0), "#CYCLE!");
    assert_eq!(engine.get_computed_value("t", 0, 1), "#CYCLE!");
    assert_eq!(engine.get_computed_value("t", 0, 3), "4");
}

#[test]
fn currency_and_percent_literals_are_numbers() {
    let mut engine = SheetEngine::new();
    engine.update_sheet("t", &grid(&[&["20%", "$1,200", "=A1*B1"]]));

    assert_eq!(engine.get_computed_value("t", 0, 2), "240");
}

#[test]
fn removed_sheet_is_gone() {
    let mut engine = SheetEngine::new();
    engine.update_sheet("t", &grid(&[&["1"]]));

    assert!(engine.remove_sheet("t"));
    assert!(!engine.remove_sheet("t"));
    assert_eq!(engine.get_computed_value("t", 0, 0), "");
}

#[test]
fn today_reads_from_injected_clock() {
    fn fixed() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(1970, 1, 2, 12, 0, 0).unwrap()
    }
    let mut engine = SheetEngine::with_clock(fixed);
    engine.update_sheet("t", &grid(&[&["=TODAY()"]]));

    assert_eq!(engine.get_computed_value("t", 0, 0), "25570");
}

#[test]
fn catalog_lists_documented_functions_first() {
    let engine = SheetEngine::new();
    let catalog = engine.function_catalog();
    let names: Vec<&str> = catalog.iter().map(|entry| entry.name.as_str()).collect();

    assert_eq!(
        &names[..10],
        &[
            "AVERAGE",
            "CONCATENATE",
            "COUNT",
            "IF",
            "MAX",
            "MIN",
            "NOW",
            "SUM",
            "TODAY",
            "VLOOKUP"
        ]
    );
    assert!(catalog[..10].iter().all(|entry| !entry.description.is_empty()));
    assert!(catalog[10..].iter().all(|entry| entry.description.is_empty()));
    assert!(catalog[10..]
        .windows(2)
        .all(|pair| pair[0].name < pair[1].name));
    assert_eq!(catalog.len(), 21);
}

#[test]
fn suggestions_match_typed_prefix() {
    let engine = SheetEngine::new();
    let names: Vec<String> = engine
        .suggest_functions("=SU")
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(names, vec!["SUM"]);
}

#[test]
fn addresses_for_range_picking() {
    assert_eq!(coords_to_address(0, 0), "A1");
    assert_eq!(coords_to_address(9, 2), "C10");
    assert_eq!(
        range_address(CellAddr::new(0, 0), CellAddr::new(2, 1)),
        "A1:B3"
    );
    assert_eq!(range_address(CellAddr::new(1, 1), CellAddr::new(1, 1)), "B2");
}
