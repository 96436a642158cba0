//! Command sequencing for Safera Sense writes.
//!
//! Intents are encoded into ordered frames and written to the command pipe
//! without response. Dependent frames are spaced by the sequence's
//! inter-frame delay. Failed writes are reported, never retried.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{
    BOOST_FRAME_DELAY, Characteristic, CommandFrame, CommandSequence, encode_device_command,
    encode_fan_command, encode_light_command, encode_select_day,
};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{CommandIntent, FanIntent, LightIntent};

/// Default minimum delay between dependent frames.
pub const DEFAULT_INTER_FRAME_DELAY: Duration = BOOST_FRAME_DELAY;

/// Turns command intents into ordered writes.
pub struct CommandSequencer<T> {
    session: Arc<Session<T>>,
    inter_frame_delay: Duration,
}

impl<T: Transport + 'static> CommandSequencer<T> {
    /// Creates a new sequencer for the session.
    #[must_use]
    pub const fn new(session: Arc<Session<T>>) -> Self {
        Self {
            session,
            inter_frame_delay: DEFAULT_INTER_FRAME_DELAY,
        }
    }

    /// Sets the minimum delay between dependent frames.
    ///
    /// A sequence that asks for a longer delay still gets it.
    pub const fn set_inter_frame_delay(&mut self, delay: Duration) {
        self.inter_frame_delay = delay;
    }

    /// Encodes an intent without writing it.
    pub fn encode(intent: CommandIntent) -> Result<CommandSequence> {
        match intent {
            CommandIntent::Fan(fan) => encode_fan_command(fan),
            CommandIntent::Light(light) => encode_light_command(light).map(Into::into),
            CommandIntent::Device { opcode, param } => {
                Ok(encode_device_command(opcode, param).into())
            }
        }
    }

    /// Encodes and writes an intent.
    ///
    /// Invalid intents are rejected before anything is written.
    pub async fn execute(&self, intent: CommandIntent) -> Result<()> {
        let sequence = Self::encode(intent)?;
        tracing::debug!("executing {:?} as {} frame(s)", intent, sequence.len());
        self.send_sequence(&sequence).await
    }

    /// Writes a sequence in order, sleeping between frames.
    pub async fn send_sequence(&self, sequence: &CommandSequence) -> Result<()> {
        let delay = sequence.inter_frame_delay.max(self.inter_frame_delay);
        for (index, frame) in sequence.frames.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            self.send_frame(frame).await?;
        }
        Ok(())
    }

    async fn send_frame(&self, frame: &CommandFrame) -> Result<()> {
        tracing::debug!("command frame {:?}", frame);
        self.session
            .write(
                Characteristic::Command.uuid(),
                Bytes::copy_from_slice(frame.as_bytes()),
                false,
            )
            .await
    }

    /// Sets the fan.
    pub async fn set_fan(&self, intent: FanIntent) -> Result<()> {
        self.execute(intent.into()).await
    }

    /// Sets the light.
    pub async fn set_light(&self, intent: LightIntent) -> Result<()> {
        self.execute(intent.into()).await
    }

    /// Sends an arbitrary device command.
    pub async fn send_device_command(&self, opcode: u32, param: u32) -> Result<()> {
        self.execute(CommandIntent::Device { opcode, param }).await
    }

    /// Selects the day the statistics characteristic reports.
    pub async fn select_day(&self, opcode: u32, day: u16) -> Result<()> {
        self.send_frame(&encode_select_day(opcode, day)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::session::SessionConfig;
    use crate::transport::mock::MockTransport;
    use crate::types::{FanLevel, LightLevel};

    async fn connected() -> (MockTransport, CommandSequencer<MockTransport>) {
        let mock = MockTransport::new();
        let session = Arc::new(Session::new(mock.clone(), SessionConfig::default()));
        session.connect().await.unwrap();
        (mock, CommandSequencer::new(session))
    }

    #[tokio::test(start_paused = true)]
    async fn test_boost_writes_two_frames_in_order() {
        let (mock, sequencer) = connected().await;
        sequencer
            .set_fan(FanIntent::level(FanLevel::Boost))
            .await
            .unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(&writes[0].data[..], &[0x01, 0x20, 0, 0, 0x78, 0, 0, 0]);
        assert_eq!(&writes[1].data[..], &[0x02, 0x10, 0, 0, 0x78, 0, 0, 0]);
        assert!(writes[1].at - writes[0].at >= Duration::from_millis(100));
        assert!(writes.iter().all(|w| !w.with_response));
        assert!(
            writes
                .iter()
                .all(|w| w.uuid == Characteristic::Command.uuid())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_delay_is_honoured() {
        let (mock, mut sequencer) = connected().await;
        sequencer.set_inter_frame_delay(Duration::from_millis(250));
        sequencer
            .set_fan(FanIntent::level(FanLevel::Boost))
            .await
            .unwrap();

        let writes = mock.writes();
        assert!(writes[1].at - writes[0].at >= Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_frame_commands() {
        let (mock, sequencer) = connected().await;
        sequencer
            .set_light(LightIntent::level(LightLevel::Level2))
            .await
            .unwrap();
        sequencer.set_fan(FanIntent::auto()).await.unwrap();
        sequencer
            .send_device_command(0x0000_0301, 7)
            .await
            .unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(&writes[0].data[..], &[0x05, 0x20, 0, 0, 0x3C, 0, 0, 0]);
        assert_eq!(&writes[1].data[..], &[0x04, 0x20, 0, 0, 0x02, 0, 0, 0]);
        assert_eq!(&writes[2].data[..], &[0x01, 0x03, 0, 0, 0x07, 0, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_intent_writes_nothing() {
        let (mock, sequencer) = connected().await;
        assert!(matches!(
            sequencer.set_light(LightIntent::auto()).await,
            Err(Error::InvalidCommandIntent { .. })
        ));
        assert!(mock.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_reported_without_retry() {
        let mock = MockTransport::new();
        let session = Arc::new(Session::new(mock.clone(), SessionConfig::default()));
        let sequencer = CommandSequencer::new(Arc::clone(&session));

        assert!(matches!(
            sequencer.set_fan(FanLevel::Level1.into()).await,
            Err(Error::NotConnected)
        ));

        session.connect().await.unwrap();
        mock.drop_link().await;
        assert!(matches!(
            sequencer.set_fan(FanLevel::Boost.into()).await,
            Err(Error::NotConnected)
        ));
        assert!(mock.writes().is_empty());
    }
}
