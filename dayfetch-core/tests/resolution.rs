//! Resolver and relative resolver behaviour against an in-memory archive.

mod common;

use common::{anchor, d, FakeArchive, StuckArchive, PROBE};
use dayfetch_core::archive::FetchError;
use dayfetch_core::domain::{Resolution, ResolutionOutcome, ResourceId};
use dayfetch_core::resolve::{estimate, Resolver};

const CAP: u32 = 64;

fn resolved(id: u64, date: chrono::NaiveDate) -> ResolutionOutcome {
    ResolutionOutcome::Resolved(Resolution {
        id: ResourceId(id),
        date,
    })
}

/// Ids 100.. for every business day of January 2024, no holidays.
fn january() -> FakeArchive {
    FakeArchive::business_days(100, d(2024, 1, 2), d(2024, 1, 31), &[])
}

#[test]
fn anchor_date_resolves_with_a_single_probe() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(estimate(&a, a.anchor_date), Some(ResourceId(100)));
    assert_eq!(resolver.resolve(a.anchor_date).unwrap(), resolved(100, d(2024, 1, 2)));
    assert_eq!(archive.probed_ids(), vec![100]);
}

#[test]
fn next_day_estimate_is_exact() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(estimate(&a, d(2024, 1, 3)), Some(ResourceId(101)));
    assert_eq!(resolver.resolve(d(2024, 1, 3)).unwrap(), resolved(101, d(2024, 1, 3)));
    assert_eq!(archive.probed_ids(), vec![101]);
}

#[test]
fn corrects_for_holidays_after_the_anchor() {
    // MLK day and a made-up closure push every later estimate up by two
    let holidays = [d(2024, 1, 15), d(2024, 1, 23)];
    let archive = FakeArchive::business_days(100, d(2024, 1, 2), d(2024, 2, 29), &holidays);
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    let target = d(2024, 2, 7);
    let expected = archive.id_of(target).unwrap();
    assert_eq!(estimate(&a, target), Some(ResourceId(expected.0 + 2)));
    assert_eq!(resolver.resolve(target).unwrap(), resolved(expected.0, target));
}

#[test]
fn corrects_for_holidays_before_the_anchor() {
    let holidays = [d(2023, 12, 25), d(2024, 1, 1)];
    let archive = FakeArchive::business_days(1, d(2023, 12, 1), d(2024, 1, 31), &holidays);
    let anchor_id = archive.id_of(d(2024, 1, 10)).unwrap();
    let a = anchor(anchor_id.0, d(2024, 1, 10), d(2023, 12, 1));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    let target = d(2023, 12, 20);
    let expected = archive.id_of(target).unwrap();
    assert_eq!(resolver.resolve(target).unwrap(), resolved(expected.0, target));
}

#[test]
fn oscillation_guard_steps_forward() {
    // 10: Fri 5th, 11: Tue 9th, 12: Wed 10th, 13: Mon 15th
    let archive = FakeArchive::new();
    archive.publish(10, d(2024, 1, 5));
    archive.publish(11, d(2024, 1, 9));
    archive.publish(12, d(2024, 1, 10));
    archive.publish(13, d(2024, 1, 15));
    let a = anchor(10, d(2024, 1, 5), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    // estimate 13 reports +3 days, 13-3=10 reports -3 days: the two cancel,
    // so the next probe is 11 rather than back to 13
    assert_eq!(resolver.resolve(d(2024, 1, 10)).unwrap(), resolved(12, d(2024, 1, 10)));
    assert_eq!(archive.probed_ids(), vec![13, 10, 11, 12]);
}

#[test]
fn weekend_target_is_not_found() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2024, 1, 6)).unwrap(), ResolutionOutcome::NotFound);
}

#[test]
fn weekend_falls_back_to_friday() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(
        resolver.resolve_relative(d(2024, 1, 6)).unwrap(),
        resolved(103, d(2024, 1, 5))
    );
}

#[test]
fn holiday_falls_back_to_previous_business_day() {
    let archive = FakeArchive::business_days(100, d(2024, 1, 2), d(2024, 1, 31), &[d(2024, 1, 15)]);
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2024, 1, 15)).unwrap(), ResolutionOutcome::NotFound);
    let friday = archive.id_of(d(2024, 1, 12)).unwrap();
    assert_eq!(
        resolver.resolve_relative(d(2024, 1, 15)).unwrap(),
        resolved(friday.0, d(2024, 1, 12))
    );
}

#[test]
fn unpublished_today_falls_back_to_latest_dataset() {
    // published through Fri 12th with a holiday on the 8th, today is Tue 16th
    let archive = FakeArchive::business_days(100, d(2024, 1, 2), d(2024, 1, 12), &[d(2024, 1, 8)]);
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2024, 1, 16)).unwrap(), ResolutionOutcome::NotFound);
    assert!(!resolver.is_data_available(d(2024, 1, 16)).unwrap());

    let latest = archive.id_of(d(2024, 1, 12)).unwrap();
    assert_eq!(
        resolver.resolve_relative(d(2024, 1, 16)).unwrap(),
        resolved(latest.0, d(2024, 1, 12))
    );
    assert!(resolver.is_data_available(d(2024, 1, 12)).unwrap());
}

#[test]
fn before_earliest_is_out_of_range() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2024, 1, 1)).unwrap(), ResolutionOutcome::OutOfRange);
    assert_eq!(resolver.resolve_relative(d(2023, 12, 29)).unwrap(), ResolutionOutcome::OutOfRange);
    assert!(archive.calls().is_empty(), "out-of-range dates must not probe");
}

#[test]
fn walk_back_stops_at_earliest_date() {
    let archive = FakeArchive::new();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve_relative(d(2024, 1, 4)).unwrap(), ResolutionOutcome::OutOfRange);
}

#[test]
fn inconsistent_archive_diverges() {
    // every identifier claims to be Jan 2nd: corrections never converge
    let archive = StuckArchive(d(2024, 1, 2));
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2024, 3, 1)).unwrap(), ResolutionOutcome::Divergent);
    assert_eq!(
        resolver.resolve_relative(d(2024, 3, 1)).unwrap(),
        ResolutionOutcome::Divergent
    );
}

#[test]
fn iteration_cap_bounds_probe_count() {
    let archive = StuckArchive(d(2024, 1, 2));
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, 5);
    assert_eq!(resolver.resolve(d(2024, 6, 3)).unwrap(), ResolutionOutcome::Divergent);

    // a consistent archive converges well inside the same small cap
    let archive = january();
    let resolver = Resolver::new(&a, &archive, PROBE, 5);
    assert_eq!(resolver.resolve(d(2024, 1, 31)).unwrap(), resolved(121, d(2024, 1, 31)));
}

#[test]
fn estimate_below_zero_diverges() {
    let archive = FakeArchive::new();
    let a = anchor(2, d(2024, 1, 2), d(2000, 1, 3));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    assert_eq!(resolver.resolve(d(2000, 1, 3)).unwrap(), ResolutionOutcome::Divergent);
    assert!(archive.calls().is_empty());
}

#[test]
fn transport_errors_propagate() {
    let archive = january();
    archive.set_offline(true);
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    let err = resolver.resolve(d(2024, 1, 3)).unwrap_err();
    assert!(matches!(err, FetchError::NetworkUnreachable(_)));
    assert!(resolver.resolve_relative(d(2024, 1, 3)).is_err());
    assert!(resolver.is_data_available(d(2024, 1, 3)).is_err());
}

#[test]
fn repeated_resolution_probes_again() {
    let archive = january();
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    resolver.resolve(d(2024, 1, 10)).unwrap();
    let first = archive.probed_ids().len();
    resolver.resolve(d(2024, 1, 10)).unwrap();
    assert_eq!(archive.probed_ids().len(), first * 2);
}

/// Every fifth business day from 2024-01-03 until `count` are collected.
fn spaced_holidays(count: usize) -> Vec<chrono::NaiveDate> {
    let mut holidays = Vec::new();
    let mut date = d(2024, 1, 3);
    let mut seen = 0;
    while holidays.len() < count {
        if dayfetch_core::calendar::is_business_day(date) {
            if seen % 5 == 0 {
                holidays.push(date);
            }
            seen += 1;
        }
        date += chrono::Duration::days(1);
    }
    holidays
}

#[test]
fn newest_dataset_resolves_with_more_holidays_than_the_cap() {
    // 70 holidays since the anchor: estimates near the end overshoot the
    // newest identifier by 70, more than the 64 corrections allowed
    let holidays = spaced_holidays(70);
    let archive = FakeArchive::business_days(100, d(2024, 1, 2), d(2025, 12, 31), &holidays);
    let a = anchor(100, d(2024, 1, 2), d(2024, 1, 2));
    let resolver = Resolver::new(&a, &archive, PROBE, CAP);

    let newest = archive.id_of(d(2025, 12, 31)).unwrap();
    assert_eq!(estimate(&a, d(2025, 12, 31)), Some(ResourceId(newest.0 + 70)));

    assert_eq!(resolver.resolve(d(2025, 12, 31)).unwrap(), resolved(newest.0, d(2025, 12, 31)));
    assert!(archive.probed_ids().len() <= 20, "{} lookups", archive.probed_ids().len());

    // the day after is unpublished: fall back to the newest dataset
    archive.clear_calls();
    assert_eq!(
        resolver.resolve_relative(d(2026, 1, 2)).unwrap(),
        resolved(newest.0, d(2025, 12, 31))
    );
    assert!(!resolver.is_data_available(d(2026, 1, 2)).unwrap());
    assert!(resolver.is_data_available(d(2025, 12, 31)).unwrap());
}
