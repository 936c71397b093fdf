use fiscal_profile_builder::*;

const DICTIONARY: &str = r#"
buckets:
  revenues:
    Taxes: ["Taxes"]
    Intergovernmental & Other: ["Intergovernmental", "Miscellaneous"]
    Charges: ["Charges for Services"]
    Licenses & Fines: ["Licenses & Permits", "Fines & Penalties"]
    Other Financing: ["Other Financing"]
  expenditures:
    Public Safety: ["Public Safety"]
    Utilities: ["Utilities"]
    General Government: ["General Government"]
    Transportation: ["Transportation"]
    Culture & Recreation: ["Culture & Recreation"]
    Community & Social: ["Natural & Economic Environment", "Social Services"]
    Capital Outlay: ["Capital Outlay"]
    Debt Service: ["Debt Service"]
    Transfers: ["Transfers"]
"#;

const FILINGS: &str = "\
government_id,name,type,county,year,basis,Taxes,Intergovernmental,Charges for Services,Licenses & Permits,Fines & Penalties,Miscellaneous,Other Financing,Public Safety,Utilities,General Government,Transportation,Culture & Recreation,Natural & Economic Environment,Social Services,Capital Outlay,Debt Service,Transfers,Beginning Balance,Other Increases,Other Decreases
T1,Testville,City,Franklin,2024,GAAP,100,50,50,0,0,0,0,120,40,20,10,10,0,0,0,0,0,10,5,2
T2,Second City,City,Franklin,2024,GAAP,200,,,,,,,150,,,,,,,,,,0,,
T3,Third City,City,Hamilton,2024,GAAP,300,,,,,,,100,,,,,,,,,,,,
T4,Little Falls,Village,Hamilton,2024,GAAP,50,,,,,,,20,,,,,,,,,,,,
T5,Fourth City,City,Hamilton,2024,GAAP,200,,,,,,,80,,,,,,,,,,,,
";

fn read_filings() -> anyhow::Result<Vec<GovernmentYearRow>> {
    let mut reader = csv::Reader::from_reader(FILINGS.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();
        rows.push(GovernmentYearRow::from_record(&headers, &fields)?);
    }
    Ok(rows)
}

#[test]
fn test_buckets_and_summary_from_filing() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;
    let rows = read_filings()?;

    let (rev, exp) = compute_buckets(&rows[0], &mapping)?;

    assert_eq!(rev.total("Taxes"), Some(100.0));
    assert_eq!(rev.total("Intergovernmental & Other"), Some(50.0));
    assert_eq!(rev.total("Charges"), Some(50.0));
    assert_eq!(rev.total_sum, 200.0);
    assert_eq!(rev.percent("Taxes"), Some(0.5));
    assert_eq!(rev.percent("Intergovernmental & Other"), Some(0.25));
    assert_eq!(rev.percent("Charges"), Some(0.25));
    assert_eq!(exp.total_sum, 200.0);

    let summary = add_summary(&rows[0], rev.total_sum, exp.total_sum);
    assert_eq!(summary.ending_balance, 13.0);

    Ok(())
}

#[test]
fn test_bucket_totals_sum_to_group_total() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;

    for row in read_filings()? {
        let (rev, exp) = compute_buckets(&row, &mapping)?;

        for result in [&rev, &exp] {
            let bucket_sum: f64 = result.totals().map(|(_, amount)| amount).sum();
            assert_eq!(bucket_sum, result.total_sum);

            let pct_sum: f64 = result.percents().map(|(_, pct)| pct).sum();
            if result.total_sum != 0.0 {
                assert!((pct_sum - 1.0).abs() < 1e-12, "percents sum to {}", pct_sum);
            } else {
                assert_eq!(pct_sum, 0.0);
            }
        }

        assert_eq!(rev.lines.len(), 5);
        assert_eq!(exp.lines.len(), 9);
    }

    Ok(())
}

#[test]
fn test_partial_filing_still_produces_summary() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;
    let rows = read_filings()?;

    let processed = process_row(&rows[1], &mapping)?;
    assert_eq!(processed.revenues.total("Charges"), Some(0.0));
    assert_eq!(processed.summary.other_increases, 0.0);
    assert_eq!(processed.summary.ending_balance, 200.0 - 150.0);

    let strict = mapping.clone().with_options(MappingOptions {
        treat_missing_as_zero: false,
        ..MappingOptions::default()
    });
    assert!(matches!(
        process_row(&rows[1], &strict),
        Err(FiscalProfileError::MissingColumn { .. })
    ));

    Ok(())
}

#[test]
fn test_peer_statistics_across_filings() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;
    let processed = FiscalProfileProcessor::process_with_verification(&read_filings()?, &mapping, 1e-9)?;
    let table = FiscalProfileProcessor::peer_table(&processed);

    let stats = compute_peer_stats(&table, &["type", "year"], &["rev:Taxes", TOTAL_EXPENDITURES])?;
    assert_eq!(stats.len(), 2);

    let city = stats.find_rows(&["type", "year"], &["City".into(), 2024.into()]);
    assert_eq!(city.len(), 1);
    // City taxes: 100, 200, 300, 200
    assert_eq!(stats.number(city[0], "rev:Taxes_mean"), Some(200.0));
    assert_eq!(stats.number(city[0], "rev:Taxes_median"), Some(200.0));

    let village = stats.find_rows(&["type", "year"], &["Village".into(), 2024.into()]);
    assert_eq!(stats.number(village[0], "rev:Taxes_mean"), Some(50.0));
    assert_eq!(stats.number(village[0], "rev:Taxes_median"), Some(50.0));
    assert_eq!(stats.number(village[0], "total_expenditures_mean"), Some(20.0));

    Ok(())
}

#[test]
fn test_ranks_with_ties() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;
    let processed = process_rows(&read_filings()?, &mapping)?;
    let table = FiscalProfileProcessor::peer_table(&processed);

    let ranked = add_ranks_within_peers(&table, &["type", "year"], "rev:Taxes", RankOrder::Descending)?;

    // Cities in file order: T1=100, T2=200, T3=300, T5=200
    assert_eq!(ranked.number(0, RANK_COLUMN), Some(4.0));
    assert_eq!(ranked.number(1, RANK_COLUMN), Some(2.0));
    assert_eq!(ranked.number(2, RANK_COLUMN), Some(1.0));
    assert_eq!(ranked.number(4, RANK_COLUMN), Some(2.0));
    assert_eq!(ranked.number(3, RANK_COLUMN), Some(1.0));

    for idx in [0, 1, 2, 4] {
        assert_eq!(ranked.number(idx, OF_N_COLUMN), Some(4.0));
    }
    assert_eq!(ranked.number(3, OF_N_COLUMN), Some(1.0));

    for idx in 0..table.len() {
        assert_eq!(ranked.get(idx, "government_id"), table.get(idx, "government_id"));
    }

    let cheapest = add_ranks_within_peers(&table, &["type"], TOTAL_EXPENDITURES, RankOrder::Ascending)?;
    // City expenditures: T1=200, T2=150, T3=100, T5=80
    assert_eq!(cheapest.number(4, RANK_COLUMN), Some(1.0));
    assert_eq!(cheapest.number(0, RANK_COLUMN), Some(4.0));

    Ok(())
}

#[test]
fn test_profile_export() -> anyhow::Result<()> {
    let mapping = MappingConfig::from_yaml_str(DICTIONARY)?;
    let rows = read_filings()?;
    let profile = process_row(&rows[0], &mapping)?.to_profile();

    let json: serde_json::Value = serde_json::from_str(&profile.to_json()?)?;
    assert_eq!(json["id"], "T1");
    assert_eq!(json["name"], "Testville");
    assert_eq!(json["county"], "Franklin");
    assert_eq!(json["summary"]["ending_balance"], 13.0);
    assert_eq!(json["revenues"][1]["bucket"], "Intergovernmental & Other");
    assert_eq!(json["revenues"][1]["pct_of_total"], 0.25);

    Ok(())
}

#[test]
fn test_mapping_from_file() -> anyhow::Result<()> {
    let dir = std::env::temp_dir().join(format!("fiscal-profile-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;

    let yaml_path = dir.join("data_dictionary.yml");
    std::fs::write(&yaml_path, DICTIONARY)?;
    let from_yaml = MappingConfig::from_path(&yaml_path)?;

    let json_path = dir.join("data_dictionary.json");
    std::fs::write(&json_path, serde_json::to_string(&from_yaml)?)?;
    let from_json = MappingConfig::from_path(&json_path)?;

    assert_eq!(from_yaml, from_json);
    assert_eq!(
        from_json.expenditures().bucket_names().last(),
        Some("Transfers")
    );

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
