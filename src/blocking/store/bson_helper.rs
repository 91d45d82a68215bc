use crate::{Result, SyncError};
use bson::document::{ValueAccessError, ValueAccessResult};
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Document};
use uuid::Uuid;

/// Get a uuid value for this `key` if it exists and has the correct type for given `doc`.
pub fn get_uuid(doc: &Document, key: &str) -> ValueAccessResult<Uuid> {
    match doc.get(key) {
        Some(Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes,
        })) => Uuid::from_slice(bytes).map_err(|_| ValueAccessError::UnexpectedType),
        Some(_) => Err(ValueAccessError::UnexpectedType),
        None => Err(ValueAccessError::NotPresent),
    }
}

/// Create a new bson::Binary from given `uuid`.
pub fn new_binary(uuid: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: uuid.as_bytes().to_vec(),
    }
}

/// Get a document id, which must be stored as a string.
///
/// Ids of other types can't be queried or written back by their string rendering, so they are
/// refused instead of converted.
pub fn get_id_string(doc: &Document, key: &str) -> Result<String> {
    match doc.get(key) {
        Some(Bson::String(s)) => Ok(s.clone()),
        Some(other) => Err(SyncError::StoreError(format!(
            "field {:?} holds a non string id {:?}",
            key, other
        ))),
        None => Err(ValueAccessError::NotPresent.into()),
    }
}

/// Read the value of `key` as seconds since epoch.
///
/// Datetimes, integers, doubles and decimal strings are accepted.
pub fn get_epoch_secs(doc: &Document, key: &str) -> Result<i64> {
    let value = doc.get(key).ok_or(ValueAccessError::NotPresent)?;
    match value {
        Bson::DateTime(dt) => Ok(dt.timestamp_millis().div_euclid(1000)),
        Bson::Int32(v) => Ok(*v as i64),
        Bson::Int64(v) => Ok(*v),
        Bson::Double(v) if v.is_finite() => Ok(*v as i64),
        Bson::String(s) => s.trim().parse::<i64>().map_err(|_| {
            SyncError::StoreError(format!("field {:?} has non numeric timestamp {:?}", key, s))
        }),
        other => Err(SyncError::StoreError(format!(
            "field {:?} has unsupported timestamp value {:?}",
            key, other
        ))),
    }
}

/// Like [get_epoch_secs], but refuses string timestamps.
///
/// Used where the same field is range filtered on the server, which can't compare strings
/// numerically.
pub fn get_range_epoch_secs(doc: &Document, key: &str) -> Result<i64> {
    match doc.get(key) {
        Some(Bson::String(s)) => Err(SyncError::StoreError(format!(
            "field {:?} holds string timestamp {:?}, which can't be range filtered",
            key, s
        ))),
        _ => get_epoch_secs(doc, key),
    }
}

/// Convert seconds since epoch to a bson datetime.
pub fn to_datetime(secs: i64) -> DateTime {
    DateTime::from_millis(secs.saturating_mul(1000))
}

/// Collect values of `fields` from `doc` in order, missing fields become null.
pub fn get_values(doc: &Document, fields: &[String]) -> Vec<Bson> {
    fields
        .iter()
        .map(|f| doc.get(f).cloned().unwrap_or(Bson::Null))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use bson::doc;

    #[test]
    fn test_uuid_round_trip() {
        let uuid = Uuid::parse_str("c050283e-3641-4d79-8e82-6665b7a4d19b").unwrap();
        let d = doc! {"id": new_binary(uuid)};
        assert_eq!(get_uuid(&d, "id").unwrap(), uuid);
        assert!(matches!(
            get_uuid(&d, "missing"),
            Err(ValueAccessError::NotPresent)
        ));
        assert!(matches!(
            get_uuid(&doc! {"id": "abc"}, "id"),
            Err(ValueAccessError::UnexpectedType)
        ));
    }

    #[test]
    fn test_id_string_only_accepts_strings() {
        let uuid = Uuid::parse_str("c050283e-3641-4d79-8e82-6665b7a4d19b").unwrap();
        let d = doc! {
            "s": "c050283e-3641-4d79-8e82-6665b7a4d19b",
            "bin": new_binary(uuid),
            "oid": bson::oid::ObjectId::new(),
        };
        assert_eq!(
            get_id_string(&d, "s").unwrap(),
            "c050283e-3641-4d79-8e82-6665b7a4d19b"
        );
        assert!(matches!(get_id_string(&d, "bin"), Err(SyncError::StoreError(_))));
        assert!(matches!(get_id_string(&d, "oid"), Err(SyncError::StoreError(_))));
        assert!(matches!(
            get_id_string(&d, "missing"),
            Err(SyncError::BsonError(ValueAccessError::NotPresent))
        ));
    }

    #[test]
    fn test_epoch_secs() {
        let d = doc! {
            "dt": to_datetime(1_600_000_000),
            "i32": 100_i32,
            "i64": 200_i64,
            "f": 300.7,
            "s": "400",
            "bad": "abc",
            "b": true,
        };
        assert_eq!(get_epoch_secs(&d, "dt").unwrap(), 1_600_000_000);
        assert_eq!(get_epoch_secs(&d, "i32").unwrap(), 100);
        assert_eq!(get_epoch_secs(&d, "i64").unwrap(), 200);
        assert_eq!(get_epoch_secs(&d, "f").unwrap(), 300);
        assert_eq!(get_epoch_secs(&d, "s").unwrap(), 400);
        assert!(get_epoch_secs(&d, "bad").is_err());
        assert!(get_epoch_secs(&d, "b").is_err());
        assert!(matches!(
            get_epoch_secs(&d, "missing"),
            Err(SyncError::BsonError(ValueAccessError::NotPresent))
        ));
    }

    #[test]
    fn test_range_epoch_secs_refuses_strings() {
        let d = doc! {"dt": to_datetime(1_600_000_000), "i64": 200_i64, "s": "400"};
        assert_eq!(get_range_epoch_secs(&d, "dt").unwrap(), 1_600_000_000);
        assert_eq!(get_range_epoch_secs(&d, "i64").unwrap(), 200);
        assert!(matches!(
            get_range_epoch_secs(&d, "s"),
            Err(SyncError::StoreError(_))
        ));
    }

    #[test]
    fn test_datetime_before_epoch_floors() {
        let d = doc! {"dt": DateTime::from_millis(-1500)};
        assert_eq!(get_epoch_secs(&d, "dt").unwrap(), -2);
    }

    #[test]
    fn test_get_values_missing_is_null() {
        let d = doc! {"a": 1, "c": "x"};
        let fields = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(
            get_values(&d, &fields),
            vec![Bson::Int32(1), Bson::Null, Bson::String("x".to_string())]
        );
    }
}
