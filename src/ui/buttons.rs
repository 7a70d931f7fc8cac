use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

/// IDs de los botones. Cada uno dispara exactamente la misma mutación que el
/// comando slash equivalente.
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "player_play_pause";
    pub const SKIP: &str = "player_skip";
    pub const LOOP: &str = "player_loop";
    pub const QUEUE: &str = "player_queue";
    pub const SHUFFLE: &str = "queue_shuffle";
    pub const CLEAR: &str = "queue_clear";
}

/// Controles adjuntos al mensaje de "reproduciendo".
pub fn now_playing_controls() -> Vec<CreateActionRow> {
    let play_pause = CreateButton::new(button_ids::PLAY_PAUSE)
        .emoji('⏯')
        .style(ButtonStyle::Primary);

    let skip = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .style(ButtonStyle::Success);

    let loop_mode = CreateButton::new(button_ids::LOOP)
        .emoji('🔁')
        .style(ButtonStyle::Secondary);

    let queue = CreateButton::new(button_ids::QUEUE)
        .label("Cola")
        .emoji('📜')
        .style(ButtonStyle::Secondary);

    vec![CreateActionRow::Buttons(vec![
        play_pause, skip, loop_mode, queue,
    ])]
}

/// Controles adjuntos al listado de la cola.
pub fn queue_controls() -> Vec<CreateActionRow> {
    let shuffle = CreateButton::new(button_ids::SHUFFLE)
        .emoji('🔀')
        .style(ButtonStyle::Success);

    let clear = CreateButton::new(button_ids::CLEAR)
        .label("Vaciar")
        .emoji('🗑')
        .style(ButtonStyle::Danger);

    vec![CreateActionRow::Buttons(vec![shuffle, clear])]
}
