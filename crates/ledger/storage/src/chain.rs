use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use eternal_ledger_types::{EventRecord, LedgerEvent};

/// BLAKE3 digest linking an event to its predecessor.
pub fn compute_event_hash(
    event: &LedgerEvent,
    timestamp: DateTime<Utc>,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "timestamp": timestamp,
        "event": event,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

/// Check an oldest-first slice of the event log: contiguous sequences starting
/// at 1, each record linked to the previous hash, each hash recomputable.
pub fn verify_event_chain(records: &[EventRecord]) -> StorageResult<()> {
    let mut previous: Option<&str> = None;
    for (index, record) in records.iter().enumerate() {
        let expected_sequence = index as u64 + 1;
        if record.sequence != expected_sequence {
            return Err(StorageError::InvariantViolation(format!(
                "event sequence gap: expected {expected_sequence}, found {}",
                record.sequence
            )));
        }
        if record.previous_hash.as_deref() != previous {
            return Err(StorageError::InvariantViolation(format!(
                "event {} is not linked to its predecessor",
                record.sequence
            )));
        }
        let hash = compute_event_hash(
            &record.event,
            record.timestamp,
            record.previous_hash.as_deref(),
            record.sequence,
        )?;
        if hash != record.hash {
            return Err(StorageError::InvariantViolation(format!(
                "event {} hash mismatch",
                record.sequence
            )));
        }
        previous = Some(record.hash.as_str());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use eternal_ledger_types::AccountId;

    fn record(sequence: u64, previous_hash: Option<String>) -> EventRecord {
        let event = LedgerEvent::RegistrarAuthorized {
            account: AccountId::new(format!("0xregistrar{sequence}")),
        };
        let timestamp = Utc::now();
        let hash = compute_event_hash(&event, timestamp, previous_hash.as_deref(), sequence)
            .unwrap();
        EventRecord {
            event_id: format!("event-{sequence}"),
            sequence,
            timestamp,
            event,
            previous_hash,
            hash,
        }
    }

    #[test]
    fn linked_chain_verifies() {
        let first = record(1, None);
        let second = record(2, Some(first.hash.clone()));
        assert!(verify_event_chain(&[first, second]).is_ok());
    }

    #[test]
    fn tampered_event_is_detected() {
        let first = record(1, None);
        let mut second = record(2, Some(first.hash.clone()));
        second.event = LedgerEvent::RegistrarRevoked {
            account: AccountId::new("0xregistrar2"),
        };
        assert!(matches!(
            verify_event_chain(&[first, second]),
            Err(StorageError::InvariantViolation(_))
        ));
    }

    #[test]
    fn broken_link_is_detected() {
        let first = record(1, None);
        let second = record(2, Some("not-the-previous-hash".to_string()));
        assert!(verify_event_chain(&[first, second]).is_err());
    }
}
