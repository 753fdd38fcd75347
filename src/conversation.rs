// src/conversation.rs
//
// Four-step dialogue: date -> time -> place -> topic. Each chat owns one
// `Conversation`; the `Session` inside lives from an entry command until a
// terminal state.

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::interpret::PredictionTopic;
use crate::pipeline::Services;
use crate::{BirthInfo, Location};

pub const GREETING: &str = "Здравствуйте! Давайте составим ваш гороскоп.\n\
Для начала, введите вашу дату рождения в формате ДД.ММ.ГГГГ.\n\
Вы можете в любой момент написать 'отмена' для отмены.";
pub const BAD_DATE: &str = "Пожалуйста, введите дату в правильном формате ДД.ММ.ГГГГ.";
pub const ASK_TIME: &str =
    "Спасибо. Теперь введите время рождения (часы и минуты) в формате ЧЧ:ММ (24-часовой формат).";
pub const BAD_TIME: &str = "Время должно быть в формате ЧЧ:ММ, попробуйте еще раз.";
pub const ASK_PLACE: &str = "Отлично. Теперь укажите место рождения (город и страна).";
pub const PLACE_UNRECOGNIZED: &str = "Название места не распознано, попробуйте еще раз.";
pub const PLACE_NOT_FOUND: &str =
    "Не удалось найти этот населенный пункт. Пожалуйста, введите город и страну еще раз.";
pub const ASK_TOPIC: &str = "Принято. Что вы хотите узнать?\n\
Выберите один из вариантов: общий характер, гороскоп на день, совместимость, финансовые перспективы.";
pub const CANCELLED: &str =
    "Запрос отменен. Если захотите попробовать снова, просто начните заново командой 'гороскоп'.";

const START_COMMANDS: [&str; 3] = ["/start", "/goroskop", "/natal_chart"];
const START_PHRASES: [&str; 2] = ["натальная карта", "гороскоп"];
const CANCEL_WORDS: [&str; 3] = ["отмена", "Отмена", "/cancel"];

lazy_static! {
    static ref DATE_PATTERN: Regex =
        Regex::new(r"^([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})$").expect("valid date pattern");
    static ref TIME_PATTERN: Regex = Regex::new(r"^([0-9]{1,2}):([0-9]{1,2})$").expect("valid time pattern");
}

/// Parses `DD.MM.YYYY`; the date must exist in the calendar.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let captures = DATE_PATTERN.captures(text.trim())?;
    let day: u32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let year: i32 = captures[3].parse().ok()?;
    if year < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses 24-hour `HH:MM`.
pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let captures = TIME_PATTERN.captures(text.trim())?;
    let hour: u32 = captures[1].parse().ok()?;
    let minute: u32 = captures[2].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    AwaitingDate,
    AwaitingTime,
    AwaitingPlace,
    AwaitingTopic,
    Cancelled,
    Completed,
}

impl DialogueState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DialogueState::Cancelled | DialogueState::Completed)
    }
}

/// Reply keyboard the transport should attach to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    Topics,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Cancel,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    Command(Command),
    Text(&'a str),
}

impl<'a> Input<'a> {
    pub fn parse(text: &'a str) -> Self {
        let trimmed = text.trim();
        if CANCEL_WORDS.contains(&trimmed) {
            return Input::Command(Command::Cancel);
        }
        if trimmed.starts_with('/') {
            let word = trimmed.split_whitespace().next().unwrap_or(trimmed);
            // "/start@some_bot" addresses this bot in group chats
            let name = word.split('@').next().unwrap_or(word);
            return match name {
                name if START_COMMANDS.contains(&name) => Input::Command(Command::Start),
                "/cancel" => Input::Command(Command::Cancel),
                _ => Input::Command(Command::Other),
            };
        }
        Input::Text(text)
    }
}

fn is_start_phrase(text: &str) -> bool {
    START_PHRASES.contains(&text.trim())
}

/// Inputs collected so far plus the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    state: DialogueState,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    place: Option<(String, Location)>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: DialogueState::AwaitingDate,
            date: None,
            time: None,
            place: None,
        }
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn place(&self) -> Option<&(String, Location)> {
        self.place.as_ref()
    }

    pub fn birth_info(&self) -> Option<BirthInfo> {
        let (place, location) = self.place.clone()?;
        Some(BirthInfo {
            date: self.date?,
            time: self.time?,
            place,
            location,
        })
    }

    pub fn cancel(&mut self) -> Reply {
        debug!(from = ?self.state, "dialogue cancelled");
        self.state = DialogueState::Cancelled;
        Reply::with_keyboard(CANCELLED, Keyboard::Remove)
    }

    /// Feeds one free-text message to the current state. Terminal sessions
    /// ignore input.
    pub async fn on_text(&mut self, text: &str, services: &Services) -> Option<Reply> {
        let reply = match self.state {
            DialogueState::AwaitingDate => self.on_date(text),
            DialogueState::AwaitingTime => self.on_time(text),
            DialogueState::AwaitingPlace => self.on_place(text, services).await,
            DialogueState::AwaitingTopic => self.on_topic(text, services).await,
            DialogueState::Cancelled | DialogueState::Completed => return None,
        };
        Some(reply)
    }

    fn on_date(&mut self, text: &str) -> Reply {
        match parse_date(text) {
            Some(date) => {
                self.date = Some(date);
                self.state = DialogueState::AwaitingTime;
                Reply::text(ASK_TIME)
            }
            None => Reply::text(BAD_DATE),
        }
    }

    fn on_time(&mut self, text: &str) -> Reply {
        match parse_time(text) {
            Some(time) => {
                self.time = Some(time);
                self.state = DialogueState::AwaitingPlace;
                Reply::text(ASK_PLACE)
            }
            None => Reply::text(BAD_TIME),
        }
    }

    async fn on_place(&mut self, text: &str, services: &Services) -> Reply {
        let place = text.trim();
        if place.is_empty() {
            return Reply::text(PLACE_UNRECOGNIZED);
        }
        match services.locate(place).await {
            Some(location) => {
                self.place = Some((place.to_string(), location));
                self.state = DialogueState::AwaitingTopic;
                Reply::with_keyboard(ASK_TOPIC, Keyboard::Topics)
            }
            None => Reply::text(PLACE_NOT_FOUND),
        }
    }

    async fn on_topic(&mut self, text: &str, services: &Services) -> Reply {
        let Some(birth_info) = self.birth_info() else {
            warn!("topic requested before birth data was complete, restarting dialogue");
            *self = Session::new();
            return Reply::with_keyboard(GREETING, Keyboard::Remove);
        };
        let topic = PredictionTopic::classify(text);
        info!(topic = ?topic, "prediction requested");

        let prediction = services.predict(&birth_info, topic).await;
        self.state = DialogueState::Completed;
        Reply::with_keyboard(prediction, Keyboard::Remove)
    }
}

/// Per-chat dialogue holder. At most one session is alive at a time.
#[derive(Debug, Default)]
pub struct Conversation {
    session: Option<Session>,
}

impl Conversation {
    pub fn new() -> Self {
        Conversation { session: None }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> Option<DialogueState> {
        self.session.as_ref().map(Session::state)
    }

    /// Routes one incoming message. `None` means the message is not answered.
    pub async fn handle(&mut self, text: &str, services: &Services) -> Option<Reply> {
        match Input::parse(text) {
            Input::Command(Command::Start) => Some(self.start()),
            Input::Command(Command::Cancel) => {
                let reply = self.session.as_mut().map(Session::cancel);
                self.finish_if_terminal();
                reply
            }
            Input::Command(Command::Other) => None,
            Input::Text(text) => match self.session.as_mut() {
                Some(session) => {
                    let reply = session.on_text(text, services).await;
                    self.finish_if_terminal();
                    reply
                }
                None if is_start_phrase(text) => Some(self.start()),
                None => None,
            },
        }
    }

    fn start(&mut self) -> Reply {
        self.session = Some(Session::new());
        Reply::text(GREETING)
    }

    fn finish_if_terminal(&mut self) {
        if self.session.as_ref().is_some_and(|session| session.state().is_terminal()) {
            self.session = None;
        }
    }
}
