//! User-facing texts of the support bot.

pub const WELCOME: &str = "👋 Добро пожаловать в QnA ассистент от Rutube!\n\n\
Задайте свой вопрос, и оператор технической поддержки ответит на него как можно скорее.\n\
оператор может войти через специальную кнопку.";

pub const LOGIN_BUTTON: &str = "👮 Войти как оператор";
pub const ASK_BUTTON: &str = "❓ Задать вопрос";
pub const THUMBS_UP: &str = "👍";
pub const THUMBS_DOWN: &str = "👎";
pub const EDIT_BUTTON: &str = "Редактировать";
pub const APPROVE_BUTTON: &str = "Оставить";

pub const ENTER_LOGIN: &str = "Введите логин:";
pub const WRONG_LOGIN: &str = "Неверный логин. Попробуйте снова.";
pub const ENTER_PASSWORD: &str = "Теперь введите пароль:";
pub const WRONG_PASSWORD: &str = "Неверный пароль. Попробуйте снова.";
pub const LOGIN_SUCCESS: &str = "Вы успешно вошли как оператор.\n\
Сюда будут приходить вопросы от пользователей, а также ответы сгенерированные LLM.\n\
Вы сможете редактировать сообщение, предложенное нейросетью и ответить пользователю";

pub const ENTER_QUESTION: &str = "Пожалуйста, введите ваш вопрос.";
pub const QUESTION_SENT: &str = "Ваш вопрос отправлен оператору.";
pub const VOICE_QUESTION_SENT: &str = "Ваш голосовой вопрос был отправлен оператору.";
pub const OPERATOR_UNAVAILABLE: &str = "Извините, оператор не доступен в данный момент.";
pub const GENERATION_FAILED: &str = "Не удалось сгенерировать ответ. Попробуйте позже.";
pub const TRANSCRIPTION_FAILED: &str = "Не удалось распознать голосовое сообщение.";

pub const ANSWER_DELIVERED: &str = "Ответ отправлен пользователю.";
pub const ENTER_EDITED_ANSWER: &str = "Введите новое сообщение для пользователя.";
pub const EDITED_ANSWER_DELIVERED: &str = "Ваш ответ отправлен пользователю.";
pub const ALREADY_HANDLED: &str = "Этот вопрос уже обработан.";

pub const UNKNOWN_COMMAND: &str = "Неизвестная команда. Используйте /start для начала.";

/// Greeting put in front of every generated answer.
pub const ANSWER_GREETING: &str = "Здравствуйте!\n";

pub fn moderator_review(question: &str, answer: &str) -> String {
    format!(
        "Вопрос от пользователя: {}\nСгенерированный ответ: {}",
        question, answer
    )
}

pub fn operator_answer(answer: &str) -> String {
    format!("Ответ от оператора: {}", answer)
}

/// Feedback reactions are accepted silently.
pub fn is_feedback(text: &str) -> bool {
    text == THUMBS_UP || text == THUMBS_DOWN
}
