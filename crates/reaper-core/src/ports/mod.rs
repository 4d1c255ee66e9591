//! Ports - abstraction layer.
//!
//! 各 trait はプロセス外（クラウド API、サブプロセス、HTTP、時計、
//! オペレータの端末）との境界。`app` のバッチ処理はこの trait だけを見て、
//! 本物と fake の実装は `impls` が持つ。

pub mod clock;
pub mod cloud;
pub mod command;
pub mod event_sink;
pub mod id_generator;
pub mod probe;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::cloud::{CloudApi, ListFilter};
pub use self::command::CommandRunner;
pub use self::event_sink::{EventSink, NoopEventSink, RecordingEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::probe::LivenessProbe;
