//! In-memory archive shared by the integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use dayfetch_core::archive::{ArtifactStream, FetchError, ResourceFetcher};
use dayfetch_core::calendar::is_business_day;
use dayfetch_core::domain::{ReferenceAnchor, ResourceId};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const PROBE: &str = "TC.txt";

pub fn artifacts() -> Vec<String> {
    ["WEBPXTICK_DT.zip", "TickData_structure.dat", "TC.txt", "TC_structure.dat"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn anchor(id: u64, date: NaiveDate, earliest: NaiveDate) -> ReferenceAnchor {
    ReferenceAnchor {
        anchor_id: ResourceId(id),
        anchor_date: date,
        earliest_date: earliest,
    }
}

/// Archive serving `{stem}_{YYYYMMDD}.{ext}` files, structure files undated.
pub struct FakeArchive {
    days: Mutex<BTreeMap<u64, NaiveDate>>,
    calls: Mutex<Vec<(ResourceId, String)>>,
    failing_artifacts: Mutex<HashSet<String>>,
    hidden_artifacts: Mutex<HashSet<String>>,
    failing_ids: Mutex<HashSet<u64>>,
    offline: AtomicBool,
}

impl FakeArchive {
    pub fn new() -> Self {
        Self {
            days: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failing_artifacts: Mutex::new(HashSet::new()),
            hidden_artifacts: Mutex::new(HashSet::new()),
            failing_ids: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Consecutive identifiers from `first_id` for every business day in
    /// `[start, end]` that is not a holiday.
    pub fn business_days(
        first_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        holidays: &[NaiveDate],
    ) -> Self {
        let archive = Self::new();
        let mut id = first_id;
        let mut date = start;
        while date <= end {
            if is_business_day(date) && !holidays.contains(&date) {
                archive.publish(id, date);
                id += 1;
            }
            date += Duration::days(1);
        }
        archive
    }

    pub fn publish(&self, id: u64, date: NaiveDate) {
        self.days.lock().unwrap().insert(id, date);
    }

    pub fn unpublish(&self, id: u64) {
        self.days.lock().unwrap().remove(&id);
    }

    pub fn id_of(&self, date: NaiveDate) -> Option<ResourceId> {
        self.days
            .lock()
            .unwrap()
            .iter()
            .find(|(_, d)| **d == date)
            .map(|(id, _)| ResourceId(*id))
    }

    pub fn published(&self) -> Vec<(ResourceId, NaiveDate)> {
        self.days
            .lock()
            .unwrap()
            .iter()
            .map(|(id, d)| (ResourceId(*id), *d))
            .collect()
    }

    pub fn fail_artifact(&self, artifact: &str) {
        self.failing_artifacts
            .lock()
            .unwrap()
            .insert(artifact.to_string());
    }

    pub fn hide_artifact(&self, artifact: &str) {
        self.hidden_artifacts
            .lock()
            .unwrap()
            .insert(artifact.to_string());
    }

    /// Every request for `id` fails in transport.
    pub fn fail_id(&self, id: u64) {
        self.failing_ids.lock().unwrap().insert(id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(ResourceId, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn probed_ids(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter(|(_, artifact)| artifact == PROBE)
            .map(|(id, _)| id.0)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn file_name(artifact: &str, date: NaiveDate) -> String {
        if artifact.contains("structure") {
            return artifact.to_string();
        }
        let (stem, ext) = artifact.rsplit_once('.').unwrap_or((artifact, "bin"));
        format!("{stem}_{}.{ext}", date.format("%Y%m%d"))
    }

    pub fn payload(artifact: &str, date: NaiveDate) -> Vec<u8> {
        format!("{artifact} for {date}").into_bytes()
    }
}

impl ResourceFetcher for FakeArchive {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch(&self, id: ResourceId, artifact: &str) -> Result<Option<ArtifactStream>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((id, artifact.to_string()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::NetworkUnreachable("archive offline".into()));
        }
        if self.failing_ids.lock().unwrap().contains(&id.0) {
            return Err(FetchError::NetworkUnreachable(format!("identifier {id} timed out")));
        }
        if self.failing_artifacts.lock().unwrap().contains(artifact) {
            return Err(FetchError::Status {
                status: 503,
                url: format!("fake://{id}/{artifact}"),
            });
        }
        if self.hidden_artifacts.lock().unwrap().contains(artifact) {
            return Ok(None);
        }

        let Some(date) = self.days.lock().unwrap().get(&id.0).copied() else {
            return Ok(None);
        };
        Ok(Some(ArtifactStream {
            file_name: Self::file_name(artifact, date),
            reported_date: Some(date),
            body: Box::new(Cursor::new(Self::payload(artifact, date))),
        }))
    }
}

/// Reports the same date for every identifier.
pub struct StuckArchive(pub NaiveDate);

impl ResourceFetcher for StuckArchive {
    fn name(&self) -> &str {
        "stuck"
    }

    fn fetch(&self, _id: ResourceId, artifact: &str) -> Result<Option<ArtifactStream>, FetchError> {
        Ok(Some(ArtifactStream {
            file_name: artifact.to_string(),
            reported_date: Some(self.0),
            body: Box::new(Cursor::new(Vec::new())),
        }))
    }
}
