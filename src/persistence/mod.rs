pub mod record;

pub use record::{
    RecordError, RecordMetadata, RunRecord, list_records, load_latest_valid_record, load_record,
    prune_records, replay, save_record,
};
