//! Record output seam

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::EntityDescriptor;
use crate::models::Record;

/// Receives emitted records in sync order
pub trait RecordSink {
    /// Called once before any record of `entity` is written
    fn start_entity(&mut self, _entity: &EntityDescriptor) -> Result<()> {
        Ok(())
    }

    fn write_record(
        &mut self,
        entity: &str,
        record: &Record,
        time_extracted: DateTime<Utc>,
    ) -> Result<()>;
}

/// An emitted record as captured by [`CollectingSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedRecord {
    pub entity: String,
    pub record: Record,
    pub time_extracted: DateTime<Utc>,
}

/// Sink that keeps every record in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    /// Started entities with their key properties, in start order
    pub entities: Vec<(String, Vec<String>)>,
    pub records: Vec<EmittedRecord>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records emitted for one entity
    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records
            .iter()
            .filter(move |r| r.entity == entity)
            .map(|r| &r.record)
    }
}

impl RecordSink for CollectingSink {
    fn start_entity(&mut self, entity: &EntityDescriptor) -> Result<()> {
        let keys = entity.key_properties.iter().map(|k| k.to_string()).collect();
        self.entities.push((entity.name.to_string(), keys));
        Ok(())
    }

    fn write_record(
        &mut self,
        entity: &str,
        record: &Record,
        time_extracted: DateTime<Utc>,
    ) -> Result<()> {
        self.records.push(EmittedRecord {
            entity: entity.to_string(),
            record: record.clone(),
            time_extracted,
        });
        Ok(())
    }
}
