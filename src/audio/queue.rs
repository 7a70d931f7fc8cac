use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::audio::track::Track;
use crate::error::MusicError;

/// Cola de reproducción de una guild.
///
/// Productor/consumidor: los comandos encolan, el loop de reproducción
/// consume con `dequeue`. Toda edición estructural (remove/move/shuffle/
/// dedupe/clear) se hace in-place bajo un único lock, así dos ediciones
/// concurrentes no pueden duplicar ni perder entradas, y los lectores
/// siempre observan un snapshot consistente.
///
/// Las posiciones de la API pública son 1-based.
pub struct PlaybackQueue {
    items: Mutex<VecDeque<Track>>,
    waker: Notify,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            waker: Notify::new(),
        }
    }

    /// Agrega al final. Nunca bloquea; despierta a un consumidor esperando.
    pub fn enqueue(&self, track: Track) {
        info!("➕ Agregado a la cola: {}", track.title());
        self.items.lock().push_back(track);
        self.waker.notify_one();
    }

    /// Re-inserta al frente, salteando el orden FIFO. Usado por el modo
    /// loop `one` para repetir el track recién terminado.
    pub fn push_front(&self, track: Track) {
        debug!("⤴️ Re-insertado al frente: {}", track.title());
        self.items.lock().push_front(track);
        self.waker.notify_one();
    }

    /// Extrae la cabeza, suspendiendo al llamador hasta que haya un track
    /// o venza `wait`. `None` significa "no llegó ninguna canción a tiempo",
    /// no es un fallo.
    pub async fn dequeue(&self, wait: Duration) -> Option<Track> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(track) = self.items.lock().pop_front() {
                return Some(track);
            }
            if tokio::time::timeout_at(deadline, self.waker.notified())
                .await
                .is_err()
            {
                // Último intento: la señal pudo llegar junto con el timeout
                return self.items.lock().pop_front();
            }
        }
    }

    /// Snapshot ordenado del contenido. No muta.
    pub fn snapshot(&self) -> Vec<Track> {
        self.items.lock().iter().cloned().collect()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Elimina y devuelve el track en `position` (1-based).
    pub fn remove_at(&self, position: usize) -> Result<Track, MusicError> {
        let mut items = self.items.lock();
        let len = items.len();
        if position == 0 || position > len {
            return Err(MusicError::OutOfRange { position, len });
        }
        // El rango ya fue validado
        let removed = items.remove(position - 1).expect("posición validada");
        debug!("❌ Eliminado de la cola: {}", removed.title());
        Ok(removed)
    }

    /// Mueve el track de `from` a `to` (ambas 1-based), preservando el orden
    /// relativo del resto. Devuelve el track movido.
    pub fn move_to(&self, from: usize, to: usize) -> Result<Track, MusicError> {
        let mut items = self.items.lock();
        let len = items.len();
        if from == 0 || from > len {
            return Err(MusicError::OutOfRange {
                position: from,
                len,
            });
        }
        if to == 0 || to > len {
            return Err(MusicError::OutOfRange { position: to, len });
        }
        if from != to {
            let track = items.remove(from - 1).expect("posición validada");
            items.insert(to - 1, track);
            debug!("📍 Track movido de {} a {}", from, to);
        }
        Ok(items[to - 1].clone())
    }

    /// Permutación uniforme del contenido actual. No-op con menos de dos
    /// canciones.
    pub fn shuffle(&self) {
        let mut items = self.items.lock();
        if items.len() < 2 {
            return;
        }
        items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada ({} canciones)", items.len());
    }

    /// Elimina ocurrencias posteriores de títulos repetidos, conservando la
    /// primera aparición en su posición. Devuelve cuántas se quitaron.
    pub fn dedupe(&self) -> usize {
        let mut items = self.items.lock();
        let original_len = items.len();
        let mut seen = HashSet::new();
        items.retain(|track| seen.insert(track.meta.title.clone()));
        let removed = original_len - items.len();
        if removed > 0 {
            info!("🗑️ Eliminados {} duplicados", removed);
        }
        removed
    }

    /// Vacía la cola y devuelve cuántas entradas había.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let removed = items.len();
        items.clear();
        if removed > 0 {
            info!("🗑️ Cola limpiada: {} canciones", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::track::TrackMetadata;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::sync::Arc;

    fn track(title: &str) -> Track {
        Track::new(
            TrackMetadata {
                title: title.to_string(),
                source_url: format!("https://example.com/{title}"),
                thumbnail: None,
                duration_secs: 60,
                uploader: None,
            },
            0.5,
            UserId::new(1),
        )
    }

    fn titles(queue: &PlaybackQueue) -> Vec<String> {
        queue
            .snapshot()
            .into_iter()
            .map(|t| t.meta.title)
            .collect()
    }

    #[tokio::test]
    async fn test_fifo_order_preserved() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        assert_eq!(titles(&queue), vec!["a", "b", "c"]);
        let first = queue.dequeue(Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.meta.title, "a");
        assert_eq!(titles(&queue), vec!["b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dequeue_times_out_on_empty_queue() {
        let queue = PlaybackQueue::new();
        let got = queue.dequeue(Duration::from_secs(300)).await;
        assert!(got.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_wakes_blocked_consumer() {
        let queue = Arc::new(PlaybackQueue::new());

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(300)).await })
        };
        tokio::task::yield_now().await;

        queue.enqueue(track("a"));
        let got = consumer.await.unwrap();
        assert_eq!(got.unwrap().meta.title, "a");
    }

    #[test]
    fn test_push_front_bypasses_fifo() {
        let queue = PlaybackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.push_front(track("repetida"));

        assert_eq!(titles(&queue), vec!["repetida", "a", "b"]);
    }

    #[test]
    fn test_remove_at_returns_removed_track() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.meta.title, "b");
        assert_eq!(titles(&queue), vec!["a", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_range_leaves_queue_unchanged() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        let err = queue.remove_at(5).unwrap_err();
        assert!(matches!(
            err,
            MusicError::OutOfRange {
                position: 5,
                len: 3
            }
        ));
        assert_eq!(titles(&queue), vec!["a", "b", "c"]);

        assert!(queue.remove_at(0).is_err());
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_move_to_relocates_preserving_relative_order() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        let moved = queue.move_to(3, 1).unwrap();
        assert_eq!(moved.meta.title, "c");
        assert_eq!(titles(&queue), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_move_to_rejects_invalid_positions() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b"] {
            queue.enqueue(track(title));
        }

        assert!(queue.move_to(0, 1).is_err());
        assert!(queue.move_to(1, 3).is_err());
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let queue = PlaybackQueue::new();
        let original: Vec<String> = (0..20).map(|i| format!("track-{i}")).collect();
        for title in &original {
            queue.enqueue(track(title));
        }

        queue.shuffle();

        let mut shuffled = titles(&queue);
        shuffled.sort();
        let mut expected = original.clone();
        expected.sort();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn test_shuffle_noop_on_singleton() {
        let queue = PlaybackQueue::new();
        queue.enqueue(track("solo"));
        queue.shuffle();
        assert_eq!(titles(&queue), vec!["solo"]);
    }

    #[test]
    fn test_dedupe_keeps_earliest_occurrence() {
        let queue = PlaybackQueue::new();
        queue.enqueue(track("a"));
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));

        let removed = queue.dedupe();
        assert_eq!(removed, 1);
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_dedupe_is_stable_for_distinct_titles() {
        let queue = PlaybackQueue::new();
        for title in ["x", "y", "x", "z", "y"] {
            queue.enqueue(track(title));
        }

        assert_eq!(queue.dedupe(), 2);
        assert_eq!(titles(&queue), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_clear_reports_count() {
        let queue = PlaybackQueue::new();
        for title in ["a", "b", "c"] {
            queue.enqueue(track(title));
        }

        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }
}
