//! End-to-end rendering scenarios over in-memory ledgers.

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use finrep_core::{
    Account, AccountId, AccountKind, AggregateField, Company, CompanyId, DateRange, EntryBuilder,
    SignedTag, TagId,
};
use finrep_engine::expand::GroupbyKey;
use finrep_engine::{
    ColumnSpec, DisplayLine, LineDefId, LineSource, Options, ReportDefinition, ReportEngine,
    ReportId, ReportLineDefinition, ReportSemantics,
};
use finrep_ledger::{Domain, MemoryLedger};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn account(id: u32, code: &str, name: &str, kind: AccountKind, company: u32) -> Account {
    Account {
        id: AccountId(id),
        code: code.into(),
        name: name.to_string(),
        kind,
        company: CompanyId(company),
    }
}

fn balance_column() -> Vec<ColumnSpec> {
    vec![ColumnSpec::new("Balance", AggregateField::Balance)]
}

/// Two companies, one debit and one credit of 21550.00 each.
fn two_company_ledger() -> MemoryLedger {
    let mut ledger = MemoryLedger::new();
    ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
    ledger.add_company(Company::new(CompanyId(2), "Branch", "USD"));
    ledger.add_account(account(1, "121000", "Receivable", AccountKind::Asset, 1));
    ledger.add_account(account(2, "400000", "Sales", AccountKind::Income, 2));
    ledger.add_entry(
        EntryBuilder::new(1, date(2017, 2, 1), CompanyId(1), AccountId(1))
            .journal("INV")
            .debit(dec!(21550.00))
            .build(),
    );
    ledger.add_entry(
        EntryBuilder::new(2, date(2017, 6, 15), CompanyId(2), AccountId(2))
            .journal("INV")
            .credit(dec!(21550.00))
            .build(),
    );
    ledger
}

fn general_ledger_report() -> ReportDefinition {
    ReportDefinition {
        id: ReportId(1),
        name: "General Ledger".to_string(),
        country: None,
        semantics: ReportSemantics::default(),
        columns: vec![
            ColumnSpec::new("Debit", AggregateField::Debit),
            ColumnSpec::new("Credit", AggregateField::Credit),
            ColumnSpec::new("Balance", AggregateField::Balance),
        ],
        lines: vec![ReportLineDefinition::new(
            LineDefId(1),
            "General Ledger",
            LineSource::Domain(Domain::all()),
        )
        .with_groupby(GroupbyKey::Account)
        .with_total()],
    }
}

#[test]
fn test_two_company_general_ledger_total() {
    let engine = ReportEngine::new(general_ledger_report(), two_company_ledger()).unwrap();
    let options = Options::builder(DateRange::new(date(2017, 1, 1), date(2017, 12, 31)))
        .companies([CompanyId(1), CompanyId(2)])
        .build()
        .unwrap();
    let lines = engine.get_lines(&options).unwrap();

    let total = lines
        .iter()
        .find(|line| line.name == "Total General Ledger")
        .unwrap();
    assert_eq!(total.columns[0].value, Some(dec!(21550.00)));
    assert_eq!(total.columns[1].value, Some(dec!(21550.00)));
    assert_eq!(total.columns[2].value, Some(dec!(0.00)));
    assert!(total.columns[2].is_zero);
}

#[test]
fn test_end_balance_chains_into_next_initial() {
    let mut ledger = MemoryLedger::new();
    ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
    ledger.add_account(account(1, "101401", "Bank", AccountKind::Asset, 1));
    // 2000.00 on the books before February, 100.00 moved within it.
    ledger.add_entry(
        EntryBuilder::new(1, date(2010, 1, 15), CompanyId(1), AccountId(1))
            .debit(dec!(2000.00))
            .build(),
    );
    ledger.add_entry(
        EntryBuilder::new(2, date(2010, 2, 10), CompanyId(1), AccountId(1))
            .debit(dec!(100.00))
            .build(),
    );

    let definition = ReportDefinition {
        id: ReportId(2),
        name: "Balance Sheet".to_string(),
        country: None,
        semantics: ReportSemantics {
            balance_chain: true,
            progressive_balance: true,
        },
        columns: balance_column(),
        lines: vec![ReportLineDefinition::new(
            LineDefId(1),
            "Bank",
            LineSource::Domain(Domain::account(AccountId(1))),
        )],
    };
    let engine = ReportEngine::new(definition, ledger).unwrap();

    let render = |range: DateRange| -> Vec<DisplayLine> {
        let options = Options::builder(range)
            .companies([CompanyId(1)])
            .build()
            .unwrap();
        engine.get_lines(&options).unwrap()
    };

    let february = render(DateRange::new(date(2010, 2, 1), date(2010, 2, 28)));
    // Initial, movement, end.
    assert_eq!(february[0].columns[0].value, Some(dec!(2000.00)));
    assert_eq!(february[0].columns[1].value, Some(dec!(100.00)));
    assert_eq!(february[0].columns[2].value, Some(dec!(2100.00)));

    let march = render(DateRange::new(date(2010, 3, 1), date(2010, 3, 31)));
    assert_eq!(march[0].columns[0].value, february[0].columns[2].value);
    assert_eq!(march[0].columns[2].value, Some(dec!(2100.00)));
}

/// A 42% tax on base 100, split 25/75 across two repartition tags.
fn tax_invoice(first_id: u64, day: u32, refund: bool) -> Vec<finrep_core::JournalEntry> {
    let orient = |debit: rust_decimal::Decimal, credit: rust_decimal::Decimal| {
        if refund {
            (credit, debit)
        } else {
            (debit, credit)
        }
    };
    let (d1, c1) = orient(dec!(142.00), dec!(0.00));
    let (d2, c2) = orient(dec!(0.00), dec!(100.00));
    let (d3, c3) = orient(dec!(0.00), dec!(10.50));
    let (d4, c4) = orient(dec!(0.00), dec!(31.50));
    vec![
        EntryBuilder::new(first_id, date(2017, 3, day), CompanyId(1), AccountId(1))
            .move_id(first_id)
            .debit(d1)
            .credit(c1)
            .build(),
        EntryBuilder::new(first_id + 1, date(2017, 3, day), CompanyId(1), AccountId(2))
            .move_id(first_id)
            .debit(d2)
            .credit(c2)
            .build(),
        EntryBuilder::new(first_id + 2, date(2017, 3, day), CompanyId(1), AccountId(3))
            .move_id(first_id)
            .debit(d3)
            .credit(c3)
            .tag(SignedTag::minus(TagId(71)))
            .build(),
        EntryBuilder::new(first_id + 3, date(2017, 3, day), CompanyId(1), AccountId(3))
            .move_id(first_id)
            .debit(d4)
            .credit(c4)
            .tag(SignedTag::minus(TagId(72)))
            .build(),
    ]
}

fn tax_ledger(with_refund: bool) -> MemoryLedger {
    let mut ledger = MemoryLedger::new();
    ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
    ledger.add_account(account(1, "121000", "Receivable", AccountKind::Asset, 1));
    ledger.add_account(account(2, "400000", "Sales", AccountKind::Income, 1));
    ledger.add_account(account(3, "251000", "Tax Received", AccountKind::Liability, 1));
    for entry in tax_invoice(1, 10, false) {
        ledger.add_entry(entry);
    }
    if with_refund {
        for entry in tax_invoice(10, 20, true) {
            ledger.add_entry(entry);
        }
    }
    ledger
}

fn tax_report() -> ReportDefinition {
    ReportDefinition {
        id: ReportId(3),
        name: "Tax Report".to_string(),
        country: None,
        semantics: ReportSemantics::default(),
        columns: balance_column(),
        lines: vec![
            ReportLineDefinition::new(LineDefId(1), "Tax 42%", LineSource::Title).with_total(),
            ReportLineDefinition::new(
                LineDefId(2),
                "Tax 42% (25%)",
                LineSource::Domain(Domain::tags([SignedTag::minus(TagId(71))])),
            )
            .with_parent(LineDefId(1)),
            ReportLineDefinition::new(
                LineDefId(3),
                "Tax 42% (75%)",
                LineSource::Domain(Domain::tags([SignedTag::minus(TagId(72))])),
            )
            .with_parent(LineDefId(1))
            .with_sequence(1),
        ],
    }
}

fn march_options() -> Options {
    Options::builder(DateRange::new(date(2017, 3, 1), date(2017, 3, 31)))
        .companies([CompanyId(1)])
        .build()
        .unwrap()
}

#[test]
fn test_tax_split_sums_to_subtotal() {
    let engine = ReportEngine::new(tax_report(), tax_ledger(false)).unwrap();
    let lines = engine.get_lines(&march_options()).unwrap();
    assert_eq!(lines[1].columns[0].value, Some(dec!(10.50)));
    assert_eq!(lines[2].columns[0].value, Some(dec!(31.50)));
    assert_eq!(lines[3].name, "Total Tax 42%");
    assert_eq!(lines[3].columns[0].value, Some(dec!(42.00)));
}

#[test]
fn test_refund_returns_every_line_to_zero() {
    let engine = ReportEngine::new(tax_report(), tax_ledger(true)).unwrap();
    let lines = engine.get_lines(&march_options()).unwrap();
    for line in &lines[1..] {
        assert_eq!(line.columns[0].value, Some(dec!(0.00)), "line {}", line.name);
        assert!(line.columns[0].is_zero);
    }
}

#[test]
fn test_blank_if_zero_column_hides_zeros_but_keeps_the_fact() {
    let mut definition = tax_report();
    definition.columns =
        vec![ColumnSpec::new("Balance", AggregateField::Balance).with_blank_if_zero()];
    let engine = ReportEngine::new(definition, tax_ledger(true)).unwrap();
    let lines = engine.get_lines(&march_options()).unwrap();
    for line in &lines[1..] {
        assert_eq!(line.columns[0].value, None, "line {}", line.name);
        assert!(line.columns[0].is_zero);
    }
}

#[test]
fn test_load_more_pages_concatenate_to_full_expansion() {
    let mut ledger = MemoryLedger::new();
    ledger.add_company(Company::new(CompanyId(1), "US Co", "USD"));
    ledger.add_account(account(1, "101401", "Bank", AccountKind::Asset, 1));
    for id in 1..=5u64 {
        ledger.add_entry(
            EntryBuilder::new(id, date(2017, 3, id as u32), CompanyId(1), AccountId(1))
                .label(format!("transfer {id}"))
                .debit(dec!(10.00))
                .build(),
        );
    }
    let definition = ReportDefinition {
        id: ReportId(4),
        name: "Bank Detail".to_string(),
        country: None,
        semantics: ReportSemantics::default(),
        columns: balance_column(),
        lines: vec![ReportLineDefinition::new(
            LineDefId(1),
            "Bank",
            LineSource::Domain(Domain::account(AccountId(1))),
        )],
    };
    let engine = ReportEngine::new(definition, ledger).unwrap();
    let parent = finrep_engine::GenericLineId::root(LineDefId(1)).encode();
    let march = DateRange::new(date(2017, 3, 1), date(2017, 3, 31));

    let paged_options = Options::builder(march)
        .companies([CompanyId(1)])
        .page_size(2)
        .build()
        .unwrap();
    let mut paged: Vec<DisplayLine> = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = engine
            .get_expanded_lines(&paged_options, &parent, cursor.as_deref())
            .unwrap();
        let more = page
            .iter()
            .find(|line| line.name == "Load more...")
            .and_then(|line| line.progress.clone());
        paged.extend(page.into_iter().filter(|line| line.name != "Load more..."));
        match more {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    let export_options = Options::builder(march)
        .companies([CompanyId(1)])
        .export_mode(true)
        .build()
        .unwrap();
    let full = engine
        .get_expanded_lines(&export_options, &parent, None)
        .unwrap();

    assert_eq!(paged.len(), 5);
    let key = |line: &DisplayLine| (line.id.clone(), line.name.clone(), line.columns.clone());
    assert_eq!(
        paged.iter().map(key).collect::<Vec<_>>(),
        full.iter().map(key).collect::<Vec<_>>()
    );
}

#[test]
fn test_rerender_is_byte_identical() {
    let engine = ReportEngine::new(general_ledger_report(), two_company_ledger()).unwrap();
    let options = Options::builder(DateRange::new(date(2017, 1, 1), date(2017, 12, 31)))
        .companies([CompanyId(1), CompanyId(2)])
        .unfold_all(true)
        .build()
        .unwrap();
    let first = serde_json::to_vec(&engine.get_lines(&options).unwrap()).unwrap();
    let second = serde_json::to_vec(&engine.get_lines(&options).unwrap()).unwrap();
    assert_eq!(first, second);
}
