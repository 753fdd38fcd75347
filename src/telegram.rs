// src/telegram.rs
//
// Bot API long-polling transport. The poll loop owns one inbox per chat;
// each chat worker owns its `Conversation`, so chats never wait on each
// other and messages within a chat are handled in order.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::conversation::{Conversation, Keyboard, Reply};
use crate::error::AstrologyError;
use crate::interpret::TOPIC_KEYBOARD;
use crate::pipeline::Services;

const WORKER_QUEUE: usize = 32;
const RETRY_DELAY: Duration = Duration::from_secs(5);
const IDLE_WORKER_AFTER: Duration = Duration::from_secs(600);
// Slack on top of the long-poll wait before the HTTP client gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

// ---------------------------
// ## Bot API payloads
// ---------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T, AstrologyError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(AstrologyError::Transport(format!(
                "{method} failed: {}",
                self.description.as_deref().unwrap_or("no description")
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat id and text of a plain text message.
    pub fn text_message(self) -> Option<(i64, String)> {
        let message = self.message?;
        Some((message.chat.id, message.text?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyboardButton {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub one_time_keyboard: bool,
    pub resize_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Keyboard(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

impl From<Keyboard> for ReplyMarkup {
    fn from(keyboard: Keyboard) -> Self {
        match keyboard {
            Keyboard::Topics => ReplyMarkup::Keyboard(ReplyKeyboardMarkup {
                keyboard: TOPIC_KEYBOARD
                    .iter()
                    .map(|row| row.iter().map(|text| KeyboardButton { text: text.to_string() }).collect())
                    .collect(),
                one_time_keyboard: true,
                resize_keyboard: true,
            }),
            Keyboard::Remove => ReplyMarkup::Remove(ReplyKeyboardRemove { remove_keyboard: true }),
        }
    }
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<ReplyMarkup>,
}

// ---------------------------
// ## HTTP client
// ---------------------------

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    endpoint: String,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, AstrologyError> {
        let client = Client::builder().timeout(poll_timeout + POLL_GRACE).build()?;
        Ok(TelegramClient {
            client,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, AstrologyError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // Failed calls still carry a JSON body with a description
        let response: ApiResponse<T> = self
            .client
            .post(self.method_url(method))
            .json(params)
            .send()
            .await?
            .json()
            .await?;
        response.into_result(method)
    }

    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>, AstrologyError> {
        let params = GetUpdates {
            offset,
            timeout: timeout.as_secs(),
            allowed_updates: ["message"],
        };
        self.call("getUpdates", &params).await
    }

    pub async fn send_message(&self, chat_id: i64, reply: &Reply) -> Result<(), AstrologyError> {
        let params = SendMessage {
            chat_id,
            text: &reply.text,
            reply_markup: reply.keyboard.map(ReplyMarkup::from),
        };
        let _sent: Message = self.call("sendMessage", &params).await?;
        Ok(())
    }
}

// ---------------------------
// ## Polling loop
// ---------------------------

pub struct TelegramBot {
    client: Arc<TelegramClient>,
    services: Services,
    poll_timeout: Duration,
    retry_delay: Duration,
    idle_after: Duration,
}

/// Poll-loop side of a chat worker.
struct ChatWorker {
    inbox: mpsc::Sender<String>,
    /// Set while a dialogue is open or a message is being handled.
    busy: Arc<AtomicBool>,
    last_message: Instant,
}

impl ChatWorker {
    fn is_idle(&self, idle_after: Duration) -> bool {
        !self.busy.load(Ordering::Acquire) && self.last_message.elapsed() >= idle_after
    }
}

impl TelegramBot {
    pub fn new(config: &BotConfig, token: &str, services: Services) -> Result<Self, AstrologyError> {
        let client = TelegramClient::new(&config.telegram_api_url, token, config.poll_timeout())?;
        Ok(TelegramBot {
            client: Arc::new(client),
            services,
            poll_timeout: config.poll_timeout(),
            retry_delay: RETRY_DELAY,
            idle_after: IDLE_WORKER_AFTER,
        })
    }

    /// Polls until Ctrl-C. Transport errors are logged and retried.
    pub async fn run(self) -> Result<(), AstrologyError> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// Polls until `shutdown` resolves, including while waiting to retry.
    pub async fn run_until<F: Future>(self, shutdown: F) -> Result<(), AstrologyError> {
        tokio::pin!(shutdown);
        let mut workers: HashMap<i64, ChatWorker> = HashMap::new();
        let mut offset = None;
        info!(poll_timeout = ?self.poll_timeout, "bot started, polling for updates");

        loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.client.get_updates(offset, self.poll_timeout) => polled,
            };

            match polled {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        if let Some((chat_id, text)) = update.text_message() {
                            self.dispatch(&mut workers, chat_id, text);
                        }
                    }
                    self.evict_idle(&mut workers);
                }
                Err(err) => {
                    warn!(error = %err, retry_in = ?self.retry_delay, "polling failed");
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        info!(chats = workers.len(), "shutdown requested, closing chat workers");
        Ok(())
    }

    fn dispatch(&self, workers: &mut HashMap<i64, ChatWorker>, chat_id: i64, text: String) {
        let worker = workers.entry(chat_id).or_insert_with(|| self.spawn_worker(chat_id));
        worker.last_message = Instant::now();
        match worker.inbox.try_send(text) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(chat_id, "chat inbox full, message dropped"),
            Err(TrySendError::Closed(text)) => {
                warn!(chat_id, "chat worker gone, restarting it");
                let worker = self.spawn_worker(chat_id);
                if worker.inbox.try_send(text).is_err() {
                    warn!(chat_id, "message dropped");
                }
                workers.insert(chat_id, worker);
            }
        }
    }

    /// Drops workers with no open dialogue and no recent messages. Dropping
    /// the sender ends the worker once its queue is drained.
    fn evict_idle(&self, workers: &mut HashMap<i64, ChatWorker>) {
        workers.retain(|chat_id, worker| {
            let keep = !worker.inbox.is_closed() && !worker.is_idle(self.idle_after);
            if !keep {
                debug!(chat_id, "evicting idle chat worker");
            }
            keep
        });
    }

    fn spawn_worker(&self, chat_id: i64) -> ChatWorker {
        let (inbox, mut messages) = mpsc::channel::<String>(WORKER_QUEUE);
        let busy = Arc::new(AtomicBool::new(false));
        let client = Arc::clone(&self.client);
        let services = self.services.clone();
        let worker_busy = Arc::clone(&busy);

        tokio::spawn(async move {
            let mut conversation = Conversation::new();
            while let Some(text) = messages.recv().await {
                worker_busy.store(true, Ordering::Release);
                debug!(chat_id, state = ?conversation.state(), "message received");
                if let Some(reply) = conversation.handle(&text, &services).await {
                    if let Err(err) = client.send_message(chat_id, &reply).await {
                        warn!(chat_id, error = %err, "failed to send reply");
                    }
                }
                worker_busy.store(conversation.is_active(), Ordering::Release);
            }
            debug!(chat_id, "chat worker stopped");
        });
        debug!(chat_id, "chat worker started");
        ChatWorker {
            inbox,
            busy,
            last_message: Instant::now(),
        }
    }
}
