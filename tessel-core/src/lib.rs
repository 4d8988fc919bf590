//! Tessel Core - namespaced config store with coherent local caching
//!
//! Each service instance:
//! - serves reads from a time-expiring local cache, falling back to the store
//! - writes through to a durable backing store (redis, etcd, or memory)
//! - broadcasts change events so other instances refresh their caches
//! - applies inbound events last-writer-wins by timestamp

pub mod cache;
pub mod error;
pub mod event;
pub mod key;
pub mod listener;
pub mod notify;
pub mod operations;
pub mod options;
pub mod publisher;
pub mod service;
pub mod store;
pub mod value;

pub use cache::{CacheUpdate, LocalCache};
pub use error::{Result, TesselError};
pub use event::{Change, ChangeEvent};
pub use key::{ConfigKey, DEFAULT_NAMESPACE};
pub use listener::ChangeListener;
pub use notify::{BroadcastNotifier, ChangeNotifier, ChangeStream, RedisNotifier, build_notifier};
pub use operations::{
    ApplyChangeOperation, ApplyChangeOperationOutcome, DeleteConfigOperation,
    DeleteConfigOperationRequest, DeleteConfigOperationResult, ListConfigOperation,
    ListConfigOperationRequest, ReadConfigOperation, ReadConfigOperationOutcome,
    ReadConfigOperationRequest, UpdateConfigOperation, UpdateConfigOperationRequest,
    UpdateConfigOperationResult,
};
pub use options::ServiceOptions;
pub use publisher::ChangePublisher;
pub use service::ConfigService;
pub use store::{
    ConfigRecord, ConfigStore, EtcdConfigStore, MemoryConfigStore, RedisConfigStore,
    StoreBuilder,
};
pub use value::{EncodedValue, ValueFormat, unix_now};
