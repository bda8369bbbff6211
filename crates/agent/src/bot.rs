//! The turn dispatcher.
//!
//! Every inbound message is one turn:
//!
//! 1. **Lock** the conversation (turns of one conversation never overlap)
//! 2. **Record** uploads and the user turn
//! 3. **Intercept** explicit commands
//! 4. Otherwise **plan** over the turn's capabilities and **execute**
//! 5. **Reply**, record the assistant turn, clear scratch state, save
//!
//! Any failure becomes a user-visible apology; nothing escapes a turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use planbot_capabilities::{CapabilityServices, TurnScope};
use planbot_config::BotConfig;
use planbot_core::channel::{Channel, ChannelMessage, Replier};
use planbot_core::error::Error;
use planbot_core::message::{ConversationData, ConversationId, ConversationTurn};
use planbot_core::store::ConversationStore;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::executor;
use crate::history;
use crate::interceptor::{CommandInterceptor, Intercept};
use crate::planner::{Planner, TurnContext};
use crate::response;

/// Inbound messages buffered per conversation while a turn is running.
const CONVERSATION_QUEUE: usize = 32;

/// How long a conversation worker waits for its next message before exiting.
const CONVERSATION_IDLE: Duration = Duration::from_secs(300);

const BUSY: &str = "I'm still working on your earlier messages. Please wait a moment and try again.";

/// The dispatcher's handle on a running conversation worker.
struct Worker {
    queue: mpsc::Sender<ChannelMessage>,
    /// Resolves once the worker has exited
    done: oneshot::Receiver<()>,
}

pub struct Bot {
    welcome_message: String,
    suggested_questions: Vec<String>,
    /// Token budget for the serialized history in planner prompts
    history_budget: usize,
    idle_timeout: Duration,
    services: CapabilityServices,
    planner: Arc<dyn Planner>,
    interceptor: CommandInterceptor,
    store: Arc<dyn ConversationStore>,
}

impl Bot {
    pub fn new(
        config: &BotConfig,
        services: CapabilityServices,
        planner: Arc<dyn Planner>,
        interceptor: CommandInterceptor,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            welcome_message: config.welcome_message.clone(),
            suggested_questions: config.suggested_questions.clone(),
            history_budget: (config.planner_max_tokens / 2) as usize,
            idle_timeout: CONVERSATION_IDLE,
            services,
            planner,
            interceptor,
            store,
        }
    }

    /// Override how long an idle conversation keeps its worker.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Greet new conversation members.
    pub async fn on_members_added(&self, replier: &Replier) {
        replier
            .notify(response::welcome(&self.welcome_message, &self.suggested_questions))
            .await;
    }

    /// Process one inbound message. Returns the reply text, if any.
    pub async fn handle_message(
        &self,
        msg: &ChannelMessage,
        replier: &Replier,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let id = ConversationId::from(msg.chat_id.as_str());
        let mut conversation = self.store.lock(&id).await;

        if !msg.attachments.is_empty() {
            debug!(conversation_id = %id, count = msg.attachments.len(), "Recorded uploads");
            conversation.pending_uploads.extend(msg.attachments.iter().cloned());
        }

        replier.typing().await;

        let received = response::uploads_received(&conversation.pending_uploads);
        if let Some(ack) = &received {
            replier.notify_text(ack.clone()).await;
            conversation.push(ConversationTurn::assistant(ack));
        }

        let text = msg.content.trim();
        if text.is_empty() {
            conversation.end_turn();
            self.store.save(&conversation).await;
            return received;
        }

        conversation.push(ConversationTurn::user(text));
        info!(conversation_id = %id, turns = conversation.turns.len(), "Turn started");

        let reply = match self.respond(&conversation, text, replier, cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(conversation_id = %id, error = %e, "Turn failed");
                let apology = response::error_text(&e);
                replier.notify_text(apology.clone()).await;
                Some(apology)
            }
        };

        if let Some(reply) = &reply {
            conversation.push(ConversationTurn::assistant(reply));
        }
        conversation.end_turn();
        self.store.save(&conversation).await;

        info!(conversation_id = %id, replied = reply.is_some(), "Turn finished");
        reply
    }

    async fn respond(
        &self,
        conversation: &ConversationData,
        text: &str,
        replier: &Replier,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, Error> {
        if let Intercept::Handled(reply) = self.interceptor.intercept(text, replier, cancel).await {
            return Ok(Some(reply));
        }

        let history = history::serialize(&conversation.turns, self.history_budget);
        let registry = planbot_capabilities::build(
            &self.services,
            &TurnScope {
                replier,
                history: &history,
                strategy: self.planner.kind(),
            },
        )?;

        let turn = TurnContext {
            history: &history,
            registry: &registry,
            replier,
            cancel,
        };
        let plan = self.planner.plan(&turn).await?;
        let report = executor::execute(plan, &registry, replier, cancel).await?;

        if report.answer.trim().is_empty() {
            return Ok(None);
        }
        replier.notify(response::reply(&report.answer, Vec::new())).await;
        Ok(Some(report.answer))
    }

    /// Send the welcome message once per conversation.
    async fn greet_if_new(&self, replier: &Replier) {
        let id = ConversationId::from(replier.chat_id());
        let mut conversation = self.store.lock(&id).await;
        if conversation.welcomed {
            return;
        }
        conversation.welcomed = true;
        self.on_members_added(replier).await;
        self.store.save(&conversation).await;
    }

    /// Serve one conversation: its turns run one after another, in arrival
    /// order. Returns the chat id once the queue closes, the bot is
    /// cancelled, or no message arrives for the idle timeout.
    async fn serve_conversation(
        self: Arc<Self>,
        replier: Replier,
        mut inbound: mpsc::Receiver<ChannelMessage>,
        previous: Option<oneshot::Receiver<()>>,
        _done: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> String {
        // An idle predecessor may still be finishing queued turns.
        if let Some(previous) = previous {
            let _ = previous.await;
        }
        self.greet_if_new(&replier).await;

        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = tokio::time::timeout(self.idle_timeout, inbound.recv()) => match next {
                    Ok(Some(msg)) => msg,
                    Ok(None) => break,
                    Err(_) => {
                        inbound.close();
                        while let Ok(msg) = inbound.try_recv() {
                            self.handle_message(&msg, &replier, &cancel.child_token()).await;
                        }
                        debug!(chat_id = %replier.chat_id(), "Conversation idle");
                        break;
                    }
                },
            };
            self.handle_message(&msg, &replier, &cancel.child_token()).await;
        }

        debug!(chat_id = %replier.chat_id(), "Conversation worker stopped");
        replier.chat_id().to_string()
    }

    /// Hand `msg` to its conversation's worker, starting one if needed.
    ///
    /// Never waits on a busy conversation: when its queue is full the sender
    /// is told to retry and the message is dropped.
    async fn dispatch(
        self: &Arc<Self>,
        workers: &mut HashMap<String, Worker>,
        tasks: &mut JoinSet<String>,
        channel: &Arc<dyn Channel>,
        msg: ChannelMessage,
        cancel: &CancellationToken,
    ) {
        let chat_id = msg.chat_id.clone();
        let sent = match workers.get(&chat_id) {
            Some(worker) => worker.queue.try_send(msg),
            None => Err(TrySendError::Closed(msg)),
        };
        let msg = match sent {
            Ok(()) => return,
            Err(TrySendError::Full(_)) => {
                warn!(chat_id = %chat_id, "Conversation queue full, message dropped");
                Replier::new(channel.clone(), chat_id).notify_text(BUSY).await;
                return;
            }
            Err(TrySendError::Closed(msg)) => msg,
        };

        let previous = workers.remove(&chat_id).map(|w| w.done);
        let (queue, rx) = mpsc::channel(CONVERSATION_QUEUE);
        let (done_tx, done) = oneshot::channel();
        let replier = Replier::new(channel.clone(), chat_id.clone());
        tasks.spawn(self.clone().serve_conversation(replier, rx, previous, done_tx, cancel.clone()));

        if let Err(e) = queue.try_send(msg) {
            warn!(chat_id = %chat_id, error = %e, "Could not queue message");
        }
        workers.insert(chat_id, Worker { queue, done });
    }

    /// Consume the channel until its stream ends or `cancel` fires.
    ///
    /// Each conversation gets its own worker task, so different
    /// conversations are served concurrently. Idle workers exit and are
    /// started again on the conversation's next message.
    pub async fn run(
        self: Arc<Self>,
        channel: Arc<dyn Channel>,
        cancel: CancellationToken,
    ) -> Result<(), Error> {
        let mut inbound = channel.start().await?;
        let mut workers: HashMap<String, Worker> = HashMap::new();
        let mut tasks: JoinSet<String> = JoinSet::new();

        info!(channel = %channel.name(), "Bot listening");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(finished) = tasks.join_next() => {
                    match finished {
                        Ok(chat_id) => {
                            if workers.get(&chat_id).is_some_and(|w| w.queue.is_closed()) {
                                workers.remove(&chat_id);
                            }
                        }
                        Err(e) => warn!(error = %e, "Conversation task failed"),
                    }
                    continue;
                }
                next = inbound.recv() => next,
            };

            let msg = match next {
                None => break,
                Some(Err(e)) => {
                    warn!(channel = %channel.name(), error = %e, "Inbound message failed");
                    continue;
                }
                Some(Ok(msg)) => msg,
            };

            if !channel.is_allowed(&msg.sender_id) {
                warn!(sender = %msg.sender_id, "Sender not allowed, ignoring message");
                continue;
            }

            self.dispatch(&mut workers, &mut tasks, &channel, msg, &cancel).await;
        }

        // Closing the queues lets workers finish their current turn and exit.
        drop(workers);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Conversation task failed");
            }
        }

        channel.stop().await?;
        info!(channel = %channel.name(), "Bot stopped");
        Ok(())
    }
}
