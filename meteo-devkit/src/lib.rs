/*!
# Meteonet DevKit - UDP stubs and test helpers

Lets station and broker tests run against real sockets on loopback:
- Broadcast probe standing in for a broker's listener
- Control client standing in for a broker's command sender
- Fake station answering control datagrams with scripted replies
- Builders for well-formed and broken payloads
*/

pub mod message_builders;
pub mod test_utils;
pub mod udp_stub;

pub use message_builders::MessageBuilder;
pub use test_utils::TestHarness;
pub use udp_stub::{BroadcastProbe, ControlClient, FakeReply, FakeStation};
