//! Record post-processing: stamp the partition key onto every record.

use crate::partition::Partition;
use serde_json::{Map, Value};
use tracing::warn;

/// A record as emitted in a Singer `RECORD` message.
pub type Record = Map<String, Value>;

/// Merges the partition key into `raw`.
///
/// A `null` or non-object record (a project that resolved to nothing) becomes
/// a placeholder holding only the partition key. The key overwrites any field
/// of the same name already on the record.
pub fn process(raw: Value, partition: &Partition) -> Record {
    let mut record = match raw {
        Value::Object(map) => map,
        Value::Null => {
            warn!(partition = %partition, "No data returned for partition");
            Map::new()
        }
        other => {
            warn!(
                partition = %partition,
                value = %other,
                "Record is not an object, emitting placeholder"
            );
            Map::new()
        }
    };
    record.extend(partition.key_fields());
    record
}
