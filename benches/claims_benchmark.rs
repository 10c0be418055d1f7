use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use claims_analytics::adherence::CoverageCalendar;
use claims_analytics::prelude::*;
use std::sync::OnceLock;

const MEMBERS: usize = 2_000;

struct Synthetic {
    claims: Vec<MedicalClaim>,
    fills: Vec<PharmacyFill>,
    eligibility: Vec<EligibilitySpan>,
    members: Vec<String>,
}

static DATA: OnceLock<Synthetic> = OnceLock::new();

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// Deterministic synthetic population: ~12 claims, ~6 fills and one span per member
fn get_data() -> &'static Synthetic {
    DATA.get_or_init(|| {
        let dx = ["E119", "I10", "E785", "J45", "E110", "Z00"];
        let mut claims = Vec::new();
        let mut fills = Vec::new();
        let mut eligibility = Vec::new();
        let mut members = Vec::new();

        for m in 0..MEMBERS {
            let member = format!("M{:05}", m);
            for c in 0..12 {
                let day = ((m * 7 + c * 29) % 360) as i64;
                claims.push(
                    MedicalClaim::new(format!("C{}-{}", m, c), member.as_str(), base_date() + Duration::days(day), 50.0 + c as f64)
                        .with_diagnoses([dx[(m + c) % dx.len()], dx[(m * 3 + c) % dx.len()]]),
                );
            }
            for f in 0..6 {
                let day = (f * 60 + m % 20) as i64;
                fills.push(
                    PharmacyFill::new(member.as_str(), base_date() + Duration::days(day), if f % 2 == 0 { 30 } else { 90 })
                        .with_code("gpi", if m % 3 == 0 { "39400010000310" } else { "27250050000320" }),
                );
            }
            eligibility.push(EligibilitySpan::new(
                member.as_str(),
                base_date() + Duration::days((m % 90) as i64),
                base_date() + Duration::days(300 + (m % 60) as i64),
            ));
            members.push(member);
        }

        Synthetic { claims, fills, eligibility, members }
    })
}

fn benchmark_cohort(c: &mut Criterion) {
    let data = get_data();
    let config = CohortConfig::default();
    let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();

    c.bench_function("cohort_e11", |b| {
        b.iter(|| {
            let cohort = build_diagnosis_cohort(black_box(&data.claims), &["E11"], &config, as_of).unwrap();
            black_box(cohort.len())
        })
    });
}

fn benchmark_pdc(c: &mut Criterion) {
    let data = get_data();
    let config = AdherenceConfig::default();
    let start = base_date();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

    c.bench_function("pdc_single_member", |b| {
        b.iter(|| calculate_pdc(black_box(&data.fills), "M00001", &["2725"], start, end, &config).unwrap())
    });

    let mut group = c.benchmark_group("pdc_fan_out");
    group.sample_size(10);
    let analytics_config = AnalyticsConfig::default();
    let analytics = ClaimsAnalytics::new(&data.claims, &analytics_config).with_pharmacy(&data.fills);
    for size in [10usize, 100, 500] {
        let members = &data.members[..size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &members, |b, &members| {
            b.iter(|| analytics.pdc_for_members(members, &["2725"], start, end).unwrap())
        });
    }
    group.finish();
}

fn benchmark_coverage_calendar(c: &mut Criterion) {
    let mut group = c.benchmark_group("coverage_calendar");
    for days in [90u32, 365, 1095] {
        group.bench_with_input(BenchmarkId::from_parameter(days), &days, |b, &days| {
            b.iter(|| {
                let mut calendar = CoverageCalendar::new(days);
                for offset in (0..days as i64).step_by(25) {
                    calendar.mark(offset, 30);
                }
                black_box(calendar.covered_days())
            })
        });
    }
    group.finish();
}

fn benchmark_pmpm(c: &mut Criterion) {
    let data = get_data();
    let config = CostConfig::default();
    let start = base_date();
    let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

    c.bench_function("pmpm_all_members", |b| {
        b.iter(|| calculate_pmpm(black_box(&data.claims), &data.eligibility, start, end, &config).unwrap())
    });
}

fn benchmark_episodes(c: &mut Criterion) {
    let data = get_data();
    let config = EpisodeConfig::default();

    c.bench_function("episodes_single_member", |b| {
        b.iter(|| identify_episodes(black_box(&data.claims), "M00042", &config))
    });
}

criterion_group!(
    benches,
    benchmark_cohort,
    benchmark_pdc,
    benchmark_coverage_calendar,
    benchmark_pmpm,
    benchmark_episodes
);
criterion_main!(benches);
