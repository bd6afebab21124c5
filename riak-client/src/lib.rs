//! Riak HTTP client
//!
//! Objects are read, written and deleted through [`RiakObject`]; every round
//! trip rebuilds the object from the server's answer, including sibling
//! lists, links, secondary indexes and user metadata. Map/reduce jobs are
//! assembled with [`MapReduce`].

pub mod bucket;
pub mod client;
pub mod mapreduce;
pub mod object;
pub mod reconcile;
pub mod transport;

pub use bucket::Bucket;
pub use client::RiakClient;
pub use mapreduce::{FunctionPhase, LinkPhase, MapReduce, MapReduceResult, Phase, PhaseFunction, PhaseOptions};
pub use object::{Encoding, Payload, RiakObject};
pub use reconcile::{AUTO_INDEX_COLLISION_META, AUTO_INDEX_META};
pub use transport::HyperTransport;

pub use riak_core::{ClientConfig, IndexType, Link, LinkSpec, Quorum, QuorumDefaults, Result, RiakError};
pub use riak_net::{Headers, HttpResponse, Method, Transport, TransportError};
