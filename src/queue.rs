// Unbounded FIFO handoff between the question producer and the round loop.

use tokio::sync::mpsc;

use crate::types::Question;

/// What the producer hands to the round loop
#[derive(Debug, Clone, PartialEq)]
pub enum Produced {
    Question(Question),
    /// The catalog cannot satisfy the session; no more questions will follow
    Exhausted(String),
}

/// Create a connected producer/consumer pair
pub fn question_queue() -> (QuestionProducer, QuestionConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QuestionProducer { tx }, QuestionConsumer { rx })
}

/// Sending half, owned by the production task
#[derive(Debug)]
pub struct QuestionProducer {
    tx: mpsc::UnboundedSender<Produced>,
}

impl QuestionProducer {
    /// Returns false once the consumer is gone (session over)
    pub fn push(&self, question: Question) -> bool {
        self.tx.send(Produced::Question(question)).is_ok()
    }

    pub fn exhausted(&self, reason: impl Into<String>) -> bool {
        self.tx.send(Produced::Exhausted(reason.into())).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, owned by the round loop
#[derive(Debug)]
pub struct QuestionConsumer {
    rx: mpsc::UnboundedReceiver<Produced>,
}

impl QuestionConsumer {
    /// Suspend until the next item is available.
    ///
    /// `None` means the producer finished (or died) without sending more.
    pub async fn next(&mut self) -> Option<Produced> {
        self.rx.recv().await
    }

    /// Number of questions produced but not yet consumed
    pub fn backlog(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Prompt;

    fn question(id: &str) -> Question {
        Question {
            source_id: id.to_string(),
            prompt: Prompt::Anagram {
                scrambled: "x".to_string(),
            },
            answers: vec![id.to_string()],
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (producer, mut consumer) = question_queue();
        assert!(producer.push(question("a")));
        assert!(producer.push(question("b")));
        assert!(producer.exhausted("done"));
        assert_eq!(consumer.backlog(), 3);

        assert_eq!(consumer.next().await, Some(Produced::Question(question("a"))));
        assert_eq!(consumer.next().await, Some(Produced::Question(question("b"))));
        assert_eq!(
            consumer.next().await,
            Some(Produced::Exhausted("done".to_string()))
        );
    }

    #[tokio::test]
    async fn test_consumer_waits_for_producer() {
        let (producer, mut consumer) = question_queue();
        let handle = tokio::spawn(async move { consumer.next().await });

        tokio::task::yield_now().await;
        producer.push(question("late"));

        let received = handle.await.unwrap();
        assert_eq!(received, Some(Produced::Question(question("late"))));
    }

    #[tokio::test]
    async fn test_closed_after_producer_dropped() {
        let (producer, mut consumer) = question_queue();
        drop(producer);
        assert_eq!(consumer.next().await, None);
    }

    #[tokio::test]
    async fn test_push_fails_after_consumer_dropped() {
        let (producer, consumer) = question_queue();
        drop(consumer);
        assert!(producer.is_closed());
        assert!(!producer.push(question("a")));
    }
}
