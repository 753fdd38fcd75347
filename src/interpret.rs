// src/interpret.rs
//
// Prediction texts. Sign names are inflected differently per topic, so each
// topic reads from its own table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Aspect, AspectInfo, CelestialBody, PlanetPositions, ZodiacSign};

/// "в Овне": used after "Солнцем в".
const SIGNS_PREPOSITIONAL: [&str; 12] = [
    "Овне", "Тельце", "Близнецах", "Раке", "Льве", "Деве",
    "Весах", "Скорпионе", "Стрельце", "Козероге", "Водолее", "Рыбах",
];

/// "в знаке Овен".
const SIGNS_NOMINATIVE: [&str; 12] = [
    "Овен", "Телец", "Близнецы", "Рак", "Лев", "Дева",
    "Весы", "Скорпион", "Стрелец", "Козерог", "Водолей", "Рыбы",
];

/// "в знаке Овна".
const SIGNS_GENITIVE: [&str; 12] = [
    "Овна", "Тельца", "Близнецов", "Рака", "Льва", "Девы",
    "Весов", "Скорпиона", "Стрельца", "Козерога", "Водолея", "Рыб",
];

pub const TOPIC_KEYBOARD: [[&str; 2]; 2] = [
    ["общий характер", "гороскоп на день"],
    ["совместимость", "финансовые перспективы"],
];

const UNRECOGNIZED_TOPIC: &str = "Звезды выстроились в необычном порядке. Просто будьте собой и помните: \
даже если планеты нынче капризничают, ваша улыбка способна это исправить!";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredictionTopic {
    Character,
    Daily,
    Compatibility,
    Finance,
}

impl PredictionTopic {
    /// Keyword match on the lower-cased request; `None` when nothing matches.
    pub fn classify(text: &str) -> Option<Self> {
        let query = text.trim().to_lowercase();
        if query.contains("характер") {
            Some(PredictionTopic::Character)
        } else if query.contains("день") || query.contains("гороскоп") {
            Some(PredictionTopic::Daily)
        } else if query.contains("совместимость") {
            Some(PredictionTopic::Compatibility)
        } else if ["финанс", "бюджет", "карьер"].iter().any(|keyword| query.contains(keyword)) {
            Some(PredictionTopic::Finance)
        } else {
            None
        }
    }
}

impl fmt::Display for PredictionTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let topic = match self {
            PredictionTopic::Character => "general character",
            PredictionTopic::Daily => "daily horoscope",
            PredictionTopic::Compatibility => "compatibility",
            PredictionTopic::Finance => "financial outlook",
        };
        write!(f, "{}", topic)
    }
}

/// Compose the prediction text for `topic` (`None` for an unrecognized request).
pub fn interpret(positions: &PlanetPositions, aspects: &[AspectInfo], topic: Option<PredictionTopic>) -> String {
    match topic {
        Some(PredictionTopic::Character) => character(positions, aspects),
        Some(PredictionTopic::Daily) => daily(aspects),
        Some(PredictionTopic::Compatibility) => compatibility(positions),
        Some(PredictionTopic::Finance) => finance(positions),
        None => UNRECOGNIZED_TOPIC.to_string(),
    }
}

fn sign_of(positions: &PlanetPositions, body: CelestialBody) -> Option<ZodiacSign> {
    positions.get(&body).map(|&longitude| ZodiacSign::from_longitude(longitude))
}

fn character(positions: &PlanetPositions, aspects: &[AspectInfo]) -> String {
    let mut text = String::new();

    if let (Some(sun), Some(moon)) = (
        sign_of(positions, CelestialBody::Sun),
        sign_of(positions, CelestialBody::Moon),
    ) {
        text.push_str(&format!(
            "Вы родились с Солнцем в {}, а Луной в {}. ",
            SIGNS_PREPOSITIONAL[sun.index()],
            SIGNS_PREPOSITIONAL[moon.index()]
        ));
        text.push_str(match sun {
            ZodiacSign::Aries => "Вы прирожденный лидер и иногда бежите вперед паровоза. ",
            ZodiacSign::Taurus => "Вы упрямы как бык, но зато очень надежны и любите комфорт. ",
            ZodiacSign::Gemini => "Вы любознательны и непостоянны, у вас семь пятниц на неделе. ",
            _ => "",
        });
        text.push_str(match moon {
            ZodiacSign::Pisces => "Ваша душа поет в такт звездам, вы очень чувствительны. ",
            ZodiacSign::Capricorn => "Внутри вы более серьезны, чем показываете окружающим. ",
            _ => "",
        });
    }

    if let Some(first) = aspects.first() {
        text.push_str(&format!(
            "Кстати, у вас {} между {} и {}, что придает вашей личности особую изюминку. ",
            first.aspect.name_ru(),
            first.planet1.name_ru(),
            first.planet2.name_ru()
        ));
    }
    text.push_str("В целом, вы уникальны - и звезды подтверждают это с улыбкой!");
    text
}

fn daily(aspects: &[AspectInfo]) -> String {
    let mut text = String::new();

    match aspects.first() {
        Some(first) => {
            text.push_str(&format!(
                "Сегодня {} и {} образуют аспект {}. ",
                first.planet1.name_ru(),
                first.planet2.name_ru(),
                first.aspect.name_ru()
            ));
            text.push_str(match first.aspect {
                Aspect::Opposition => "Это словно перетягивание каната внутри вас: возможны колебания настроения. ",
                Aspect::Square => {
                    "Угол в 90° между планетами добавляет перца в этот день: будьте готовы к неожиданностям. "
                }
                _ => "",
            });
        }
        None => text.push_str("Сегодня звезды к вам милостивы и не создают особых аспектов. "),
    }
    text.push_str("Совет дня: улыбнитесь отражению в зеркале и вперед - звезды вам подмигивают!");
    text
}

fn compatibility(positions: &PlanetPositions) -> String {
    let mut text = String::new();

    if let Some(venus) = sign_of(positions, CelestialBody::Venus) {
        text.push_str(&format!("Ваша Венера в знаке {}, ", SIGNS_NOMINATIVE[venus.index()]));
        text.push_str(match venus {
            ZodiacSign::Leo | ZodiacSign::Aries | ZodiacSign::Sagittarius => {
                "поэтому в любви вы страстны и драматичны, как в кино. "
            }
            ZodiacSign::Taurus | ZodiacSign::Libra => "вы цените комфорт и гармонию в отношениях. ",
            _ => "ваши симпатии порой непредсказуемы. ",
        });
    }

    if let Some(mars) = sign_of(positions, CelestialBody::Mars) {
        text.push_str(&format!("Ваш Марс в знаке {}, ", SIGNS_NOMINATIVE[mars.index()]));
        text.push_str(match mars {
            ZodiacSign::Scorpio | ZodiacSign::Aries => "что придает вашим отношениям огня и интенсивности. ",
            ZodiacSign::Cancer | ZodiacSign::Pisces => {
                "что делает вас мягким и заботливым партнером, хотя иногда вы застенчивы. "
            }
            _ => "что сильно влияет на ваш стиль общения с партнером. ",
        });
    }

    text.push_str("В итоге, звезды советуют искать того, кто оценит вашу уникальность и выдержит ваш характер!");
    text
}

fn finance(positions: &PlanetPositions) -> String {
    let mut text = String::new();

    if let Some(jupiter) = sign_of(positions, CelestialBody::Jupiter) {
        text.push_str(&format!("Ваш Юпитер в знаке {}. ", SIGNS_GENITIVE[jupiter.index()]));
        text.push_str(match jupiter {
            ZodiacSign::Capricorn | ZodiacSign::Virgo => {
                "Это указывает на серьезный подход к финансам и умение планировать бюджет. "
            }
            ZodiacSign::Sagittarius | ZodiacSign::Leo => {
                "Такое положение говорит о щедрости: вы то экономите, то транжирите. "
            }
            _ => "Это положение придает вашим финансам долю непредсказуемости. ",
        });
    }

    if let Some(saturn) = sign_of(positions, CelestialBody::Saturn) {
        text.push_str(&format!("Сатурн у вас в знаке {}. ", SIGNS_GENITIVE[saturn.index()]));
        text.push_str(match saturn {
            ZodiacSign::Capricorn | ZodiacSign::Aquarius => {
                "Он дает вам дисциплину и расчетливость в денежных вопросах. "
            }
            ZodiacSign::Cancer | ZodiacSign::Pisces => "Он может вселять неуверенность в финансах, но это преодолимо. ",
            _ => "Он учит вас терпению на пути к материальным целям. ",
        });
    }

    text.push_str(
        "В итоге, ваше финансовое будущее в ваших руках. Звезды лишь намекают на путь, \
а вам решать - идти по нему или протоптать свой!",
    );
    text
}
