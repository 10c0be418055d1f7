/*!
 * End-to-end test of the claims pipeline
 *
 * Writes small medical, pharmacy and eligibility extracts to a temporary
 * directory, loads them through the dataset builder and runs cohort, PDC,
 * PMPM and episode analytics plus export over the loaded records.
 */

use chrono::{NaiveDate, NaiveDateTime};
use claims_analytics::prelude::*;
use claims_analytics::schema::ColumnMapping;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MEDICAL_CSV: &str = "\
claim_id,member_id,service_from_date,paid_amount,dx1,dx2,allowed_amount
C1,M1,2024-01-10,100.00,E119,,150
C2,M1,2024-03-15,\"$1,200.50\",I10,E110,1300
C3,M2,2024-02-01,50,E119,,
C4,M3,2024-05-01,75,J45,,80
C5,M3,2024-07-20,25,J45,,
C6,M1,2024-06-01,10,Z00,,
";

const PHARMACY_CSV: &str = "\
member_id,fill_date,days_supply,gpi,ndc
M1,2024-01-01,30,27250050000320,00093505098
M1,2024-01-20,30,27250050000320,00093505098
M1,2024-02-10,30,39400010000310,00071015523
M2,01/15/2024,90,27250050000330,00093505198
";

const ELIGIBILITY_CSV: &str = "\
member_id,eff_date,term_date
M1,2023-07-01,2024-06-30
M2,2024-02-15,2024-03-10
M4,20240101,20241231
";

struct Fixture {
    _dir: TempDir,
    medical: PathBuf,
    pharmacy: PathBuf,
    eligibility: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let medical = write(dir.path(), "medical.csv", MEDICAL_CSV);
        let pharmacy = write(dir.path(), "pharmacy.csv", PHARMACY_CSV);
        let eligibility = write(dir.path(), "eligibility.csv", ELIGIBILITY_CSV);
        Self { _dir: dir, medical, pharmacy, eligibility }
    }

    fn dataset(&self) -> ClaimsDataset {
        ClaimsDatasetBuilder::new()
            .medical_claims(&self.medical)
            .pharmacy_fills(&self.pharmacy)
            .eligibility(&self.eligibility)
            .show_progress(false)
            .build()
            .unwrap()
    }
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn year_end() -> NaiveDateTime {
    date(2024, 12, 31).and_hms_opt(0, 0, 0).unwrap()
}

#[test]
fn test_dataset_loads_all_tables() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();

    assert_eq!(dataset.len(), 6);
    assert_eq!(dataset.pharmacy_fills.as_ref().map(Vec::len), Some(4));
    assert_eq!(dataset.eligibility.as_ref().map(Vec::len), Some(3));

    let stats = dataset.statistics();
    assert_eq!(stats.distinct_members, 4);
    assert_eq!(stats.first_service_date, Some(date(2024, 1, 10)));
    assert_eq!(stats.last_service_date, Some(date(2024, 7, 20)));
    assert!((stats.total_paid - 1460.5).abs() < 1e-9);
}

#[test]
fn test_cohort_from_loaded_claims() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = AnalyticsConfig::default();

    let cohort = dataset.analytics(&config).cohort(&["E11"], year_end()).unwrap();
    assert_eq!(cohort.len(), 1);
    assert_eq!(cohort[0].member_id.as_str(), "M1");
    assert_eq!(cohort[0].index_date, date(2024, 1, 10));
    assert_eq!(cohort[0].claim_count, 2);
}

#[test]
fn test_pdc_from_loaded_fills() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = AnalyticsConfig::default();
    let analytics = dataset.analytics(&config);

    let results = analytics
        .pdc_for_members(&["M1", "M2", "M4"], &["2725"], date(2024, 1, 1), date(2024, 3, 31))
        .unwrap();

    // M1: Jan 1 + Jan 20 fills overlap, union covers days 0..=48 of 91
    assert_eq!(results[0].days_covered, 49);
    assert_eq!(results[0].observation_days, 91);
    assert_eq!(results[0].pdc, Some(53.8));
    assert_eq!(results[0].adherent, Some(false));
    assert_eq!(results[0].fills, 2);

    // M2: 90-day fill from Jan 15 clipped at Mar 31
    assert_eq!(results[1].days_covered, 77);
    assert_eq!(results[1].pdc, Some(84.6));
    assert_eq!(results[1].adherent, Some(true));

    assert_eq!(results[2].pdc, None);
    assert_eq!(results[2].adherent, None);
}

#[test]
fn test_pdc_with_alternate_code_column() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = ConfigBuilder::new().code_column("ndc").build().unwrap();

    let result = dataset.analytics(&config)
        .pdc("M1", &["00071"], date(2024, 2, 1), date(2024, 2, 29))
        .unwrap();
    assert_eq!(result.fills, 1);
    assert_eq!(result.days_covered, 20);
}

#[test]
fn test_pmpm_from_loaded_tables() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = AnalyticsConfig::default();

    let results = dataset.analytics(&config).pmpm(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
    let members: Vec<_> = results.iter().map(|r| r.member_id.as_str()).collect();
    assert_eq!(members, vec!["M1", "M2", "M4"]);

    assert_eq!(results[0].member_months, 6);
    assert!((results[0].total_cost - 1310.5).abs() < 1e-9);
    assert!((results[0].pmpm - 1310.5 / 6.0).abs() < 1e-9);

    assert_eq!(results[1].member_months, 2);
    assert_eq!(results[1].pmpm, 25.0);

    assert_eq!(results[2].member_months, 12);
    assert_eq!(results[2].total_cost, 0.0);
}

#[test]
fn test_pmpm_on_attribute_cost_column() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = ConfigBuilder::new().cost_column("allowed_amount").build().unwrap();

    let results = dataset.analytics(&config).pmpm(date(2024, 1, 1), date(2024, 12, 31)).unwrap();
    // M1 empty cell on C6 contributes nothing
    assert_eq!(results[0].total_cost, 1450.0);
    assert_eq!(results[1].total_cost, 0.0);
}

#[test]
fn test_episodes_and_export() {
    let fixture = Fixture::new();
    let dataset = fixture.dataset();
    let config = AnalyticsConfig::default();
    let analytics = dataset.analytics(&config);

    let tagged = analytics.episodes_for_members(&["M1", "M3"]).unwrap();
    let numbers: Vec<_> = tagged.iter().map(|r| (r.claim.member_id.as_str(), r.episode_num)).collect();
    assert_eq!(numbers, vec![("M1", 1), ("M1", 2), ("M1", 3), ("M3", 1), ("M3", 2)]);

    let m1 = group_episodes(&analytics.episodes("M1"));
    assert_eq!(m1.len(), 3);
    assert_eq!(m1[1].start_date, date(2024, 3, 15));

    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("episodes.csv");
    let rows: Vec<EpisodeRow> = tagged.iter().map(EpisodeClaim::to_row).collect();
    export_rows(&rows, &out, ExportFormat::Csv).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("member_id"));
    assert_eq!(headers.iter().last(), Some("episode_num"));
    let exported: Vec<EpisodeRow> = reader.deserialize().collect::<std::result::Result<_, _>>().unwrap();
    assert_eq!(exported, rows);
}

#[test]
fn test_invalid_rows_fail_or_skip() {
    let dir = TempDir::new().unwrap();
    let medical = write(
        dir.path(),
        "medical.csv",
        "claim_id,member_id,service_from_date,paid_amount,dx1\n\
         C1,M1,2024-01-10,10,E119\n\
         C2,M1,not-a-date,10,E119\n\
         C3,M2,2024-01-12,abc,E119\n",
    );

    let err = ClaimsDatasetBuilder::new()
        .medical_claims(&medical)
        .show_progress(false)
        .build()
        .unwrap_err();
    match err {
        ClaimsError::DataQuality { record, field, context, .. } => {
            assert_eq!(record.as_deref(), Some("C2"));
            assert_eq!(field, "service_from_date");
            assert_eq!(context.line_number, Some(3));
        }
        other => panic!("expected data quality error, got {:?}", other),
    }

    let dataset = ClaimsDatasetBuilder::new()
        .medical_claims(&medical)
        .skip_invalid_records(true)
        .show_progress(false)
        .build()
        .unwrap();
    assert_eq!(dataset.len(), 1);
}

#[test]
fn test_negative_days_supply_rejected() {
    let dir = TempDir::new().unwrap();
    let pharmacy = write(
        dir.path(),
        "pharmacy.csv",
        "member_id,fill_date,days_supply,gpi\nM1,2024-01-01,-30,2725\n",
    );

    let err = ClaimsReader::new().load_pharmacy_fills(&pharmacy).unwrap_err();
    assert!(matches!(err, ClaimsError::DataQuality { ref field, .. } if field == "days_supply"));
}

#[test]
fn test_missing_header_and_custom_mapping() {
    let dir = TempDir::new().unwrap();
    let eligibility = write(
        dir.path(),
        "eligibility.csv",
        "mbr_id,start,stop\nM1,2024-01-01,2024-03-31\n",
    );

    let err = ClaimsReader::new().load_eligibility(&eligibility).unwrap_err();
    assert!(matches!(err, ClaimsError::MissingColumn { ref column, .. } if column == "member_id"));

    let columns = ColumnMapping {
        member_id: "mbr_id".to_string(),
        effective_date: "start".to_string(),
        termination_date: "stop".to_string(),
        ..Default::default()
    };
    let spans = ClaimsReader::new().with_columns(columns).load_eligibility(&eligibility).unwrap();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].termination_date, date(2024, 3, 31));
}

#[test]
fn test_missing_file_reported() {
    let dir = TempDir::new().unwrap();
    let err = ClaimsDatasetBuilder::new()
        .medical_claims(dir.path().join("absent.csv"))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
}
