/**
 * The remote object-storage capability the filesystem
 *  projection is built on.
 * Holds the `RemoteStore` trait, its value types, and
 *  an HTTP adapter for a disk-style REST API.
 */
pub mod remote;
/**
 * In-memory remote store with call counters and
 *  failure injection, for exercising the read path
 *  without a network.
 */
pub mod testkit;

pub mod prelude {
    pub use crate::remote::{
        DiskClient, RangeResponse, RemoteEntry, RemoteError, RemoteMetadata, RemoteStore,
    };
}
