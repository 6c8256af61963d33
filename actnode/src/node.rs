//! Actuator node task
//!
//! [`ActuatorNode`] owns the task side of the stack: the ingestion queue consumer, the
//! protocol engine, the codec, the supervisor, the outbound queue and both collaborators.
//! Every [`step`](ActuatorNode::step) runs one cycle in a fixed order:
//! 1. drain frames captured by the interrupt handler,
//! 2. reassemble transfers and dispatch decoded commands to the supervisor,
//! 3. queue a heartbeat if one is due,
//! 4. hand queued frames to the controller,
//! 5. apply the current (or safe) command to the output.
//!
//! A command received in a cycle affects the output of the same cycle.
//!
//! ## Example
//!
//! ```
//! use actnode::config::Config;
//! use actnode::controller::{CanTx, MailboxFull};
//! use actnode::frame::Frame;
//! use actnode::ingest::FrameChannel;
//! use actnode::node::ActuatorNode;
//! use actnode::supervisor::{ActuatorOutput, OutputGate, SupervisorState};
//! use actnode::time::Instant;
//!
//! struct Mailbox;
//! impl CanTx for Mailbox {
//!     fn try_push(&mut self, _frame: &Frame) -> Result<(), MailboxFull> {
//!         Ok(())
//!     }
//! }
//!
//! struct Pwm;
//! impl ActuatorOutput for Pwm {
//!     fn apply(&mut self, _servo: &[f32; 4], _pump: bool, _readiness: u8) {}
//! }
//!
//! let mut channel: FrameChannel = FrameChannel::new();
//! let (_sink, source) = channel.split();
//! let now = Instant::from_millis(0);
//! let mut node =
//!     ActuatorNode::new(Config::default(), source, Mailbox, OutputGate::new(Pwm), now).unwrap();
//! assert_eq!(node.step(now), SupervisorState::SafeTimeout);
//! ```

use crate::codec::{Codec, CodecError, Message, MessageKind, SelectedCodec};
use crate::config::Config;
use crate::controller::CanTx;
use crate::core::{Priority, SubjectId, TransferId};
use crate::data_types::{Health, Heartbeat, Mode};
use crate::engine::{
    Engine, Subscription, SubscriptionError, SubscriptionTable, Transfer, TransferHandler,
    TransportStats,
};
use crate::ingest::{DEFAULT_QUEUE_SIZE, FrameSource};
use crate::outbound::{EnqueueError, OutboundQueue, OutboundStats};
use crate::supervisor::{ActuatorOutput, CommandState, Supervisor, SupervisorState};
use crate::time::{Duration, Instant};

const PAYLOAD_BUFFER_SIZE: usize = 64;

/// Role of a subscribed subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Topic {
    Readiness,
    /// Servo channel index
    Servo(u8),
    Pump,
}

impl Topic {
    pub const fn message_kind(self) -> MessageKind {
        match self {
            Topic::Readiness => MessageKind::Readiness,
            Topic::Servo(_) => MessageKind::Planar,
            Topic::Pump => MessageKind::Bit,
        }
    }
}

/// Transfer-ID counter of one published subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Publisher {
    subject: SubjectId,
    priority: Priority,
    next_transfer_id: TransferId,
}

impl Publisher {
    pub const fn new(subject: SubjectId, priority: Priority) -> Self {
        Self {
            subject,
            priority,
            next_transfer_id: TransferId::SESSION_START,
        }
    }

    pub fn subject(&self) -> SubjectId {
        self.subject
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn next_transfer_id(&self) -> TransferId {
        self.next_transfer_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    Encode(CodecError),
    Enqueue(EnqueueError),
}

impl From<CodecError> for PublishError {
    fn from(value: CodecError) -> Self {
        PublishError::Encode(value)
    }
}

impl From<EnqueueError> for PublishError {
    fn from(value: EnqueueError) -> Self {
        PublishError::Enqueue(value)
    }
}

/// Builds the subscription table for the configured command subjects.
pub fn subscriptions(config: &Config) -> Result<SubscriptionTable<Topic>, SubscriptionError> {
    let subscription = |subject, tag| Subscription {
        subject,
        extent: config.extent,
        timeout: config.transfer_id_timeout,
        tag,
    };

    let mut table = SubscriptionTable::new();
    table.subscribe(subscription(config.subjects.readiness, Topic::Readiness))?;
    for (channel, subject) in config.subjects.servo.iter().enumerate() {
        table.subscribe(subscription(*subject, Topic::Servo(channel as u8)))?;
    }
    table.subscribe(subscription(config.subjects.pump, Topic::Pump))?;
    Ok(table)
}

/// Dispatch context: decodes transfers and updates the command state
struct CommandSink<'a> {
    codec: &'a SelectedCodec,
    supervisor: &'a mut Supervisor,
}

impl TransferHandler<Topic> for CommandSink<'_> {
    fn on_transfer(&mut self, topic: Topic, transfer: &Transfer<'_>) {
        let message = match self.codec.decode(topic.message_kind(), transfer.payload) {
            Ok(message) => message,
            Err(_) => {
                debug!(
                    "decode failed, subject {} length {}",
                    transfer.subject.into_u16(),
                    transfer.payload.len()
                );
                self.supervisor.note_decode_error();
                return;
            }
        };

        let timestamp = transfer.timestamp;
        match (topic, message) {
            (Topic::Readiness, Message::Readiness(readiness)) => {
                self.supervisor.set_readiness(readiness, timestamp)
            }
            (Topic::Servo(channel), Message::Planar(command)) => {
                self.supervisor
                    .set_servo(usize::from(channel), &command, timestamp);
            }
            (Topic::Pump, Message::Bit(bit)) => self.supervisor.set_pump(bit.value, timestamp),
            _ => self.supervisor.note_decode_error(),
        }
    }
}

fn publish_message(
    codec: &SelectedCodec,
    outbound: &mut OutboundQueue,
    publisher: &mut Publisher,
    message: &Message,
    deadline: Instant,
) -> Result<usize, PublishError> {
    let mut buffer = [0u8; PAYLOAD_BUFFER_SIZE];
    let length = codec.encode(message, &mut buffer)?;
    let frames = outbound.enqueue(
        publisher.subject,
        publisher.next_transfer_id,
        publisher.priority,
        &buffer[..length],
        deadline,
    )?;
    publisher.next_transfer_id = publisher.next_transfer_id.next();
    Ok(frames)
}

pub struct ActuatorNode<'a, T: CanTx, O: ActuatorOutput, const RX: usize = DEFAULT_QUEUE_SIZE> {
    config: Config,
    source: FrameSource<'a, RX>,
    engine: Engine<Topic>,
    codec: SelectedCodec,
    supervisor: Supervisor,
    outbound: OutboundQueue,
    tx: T,
    output: O,
    heartbeat: Publisher,
    next_heartbeat: Instant,
    started_at: Instant,
}

impl<'a, T: CanTx, O: ActuatorOutput, const RX: usize> ActuatorNode<'a, T, O, RX> {
    /// Creates a node in the safe state.
    ///
    /// Fails if the configured subjects collide or the extent is too large.
    pub fn new(
        config: Config,
        source: FrameSource<'a, RX>,
        tx: T,
        output: O,
        now: Instant,
    ) -> Result<Self, SubscriptionError> {
        let engine = Engine::new(subscriptions(&config)?);
        info!(
            "actuator node {} up, {} subscriptions",
            config.node_id.into_u8(),
            engine.subscriptions().len()
        );
        Ok(Self {
            config,
            source,
            engine,
            codec: SelectedCodec::new(config.codec),
            supervisor: Supervisor::new(config.staleness_timeout),
            outbound: OutboundQueue::new(config.node_id, config.mtu),
            tx,
            output,
            heartbeat: Publisher::new(Heartbeat::SUBJECT, Priority::Nominal),
            next_heartbeat: now,
            started_at: now,
        })
    }

    /// Runs one cycle and returns the supervisor state it applied.
    pub fn step(&mut self, now: Instant) -> SupervisorState {
        let mut sink = CommandSink {
            codec: &self.codec,
            supervisor: &mut self.supervisor,
        };
        self.engine.process_pending(self.source.drain(), &mut sink);

        self.publish_heartbeat(now);
        self.outbound.drain(now, &mut self.tx);
        self.supervisor.cycle(now, &mut self.output)
    }

    /// Waits for frames or the cycle period, whichever comes first, then runs one cycle.
    pub async fn run_once(&mut self) -> SupervisorState {
        self.source.wait_timeout(self.config.cycle_period).await;
        self.step(Instant::now())
    }

    pub async fn run(&mut self) -> ! {
        loop {
            self.run_once().await;
        }
    }

    /// Encodes a message and queues it with the configured transmit deadline.
    ///
    /// The publisher's transfer ID advances only when the transfer was queued.
    /// Queued frames reach the controller on the next [`step`](Self::step).
    pub fn publish(
        &mut self,
        publisher: &mut Publisher,
        message: &Message,
        now: Instant,
    ) -> Result<usize, PublishError> {
        let deadline = now.saturating_add(self.config.tx_deadline);
        publish_message(&self.codec, &mut self.outbound, publisher, message, deadline)
    }

    fn publish_heartbeat(&mut self, now: Instant) {
        let Some(period) = self.config.heartbeat_period else {
            return;
        };
        if now < self.next_heartbeat {
            return;
        }

        let uptime = now.saturating_duration_since(self.started_at).as_secs();
        let health = match self.supervisor.state() {
            SupervisorState::Live => Health::Nominal,
            SupervisorState::SafeTimeout => Health::Advisory,
        };
        let message = Message::Heartbeat(Heartbeat {
            uptime: u32::try_from(uptime).unwrap_or(u32::MAX),
            health,
            mode: Mode::Operational,
            vendor_specific_status_code: 0,
        });
        let deadline = now.saturating_add(self.config.tx_deadline);
        if let Err(_err) = publish_message(
            &self.codec,
            &mut self.outbound,
            &mut self.heartbeat,
            &message,
            deadline,
        ) {
            warn!("heartbeat not queued");
        }

        // Skip missed periods after a stall instead of publishing a burst.
        self.next_heartbeat = self.next_heartbeat.saturating_add(period);
        if self.next_heartbeat <= now {
            self.next_heartbeat = now.saturating_add(period);
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    pub fn engaged(&self) -> bool {
        self.supervisor.engaged()
    }

    pub fn command(&self) -> &CommandState {
        self.supervisor.command()
    }

    pub fn decode_errors(&self) -> u32 {
        self.supervisor.decode_errors()
    }

    pub fn timeouts(&self) -> u32 {
        self.supervisor.timeouts()
    }

    /// Frames the interrupt handler dropped on a full ingestion queue
    pub fn dropped_frames(&self) -> u32 {
        self.source.dropped_frames()
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.engine.stats()
    }

    pub fn outbound_stats(&self) -> OutboundStats {
        self.outbound.stats()
    }

    /// Frames waiting for the transmit mailbox
    pub fn pending_frames(&self) -> usize {
        self.outbound.len()
    }

    pub fn codec(&self) -> &SelectedCodec {
        &self.codec
    }

    pub fn tx(&self) -> &T {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut T {
        &mut self.tx
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Time until the next heartbeat is due, `None` when disabled
    pub fn heartbeat_in(&self, now: Instant) -> Option<Duration> {
        self.config
            .heartbeat_period
            .map(|_| self.next_heartbeat.saturating_duration_since(now))
    }
}
