//! Fakes and a loopback HTTP stub shared by the unit tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

use crate::{
    news_client::{Headline, NewsSource},
    notify::{MessageHandle, NotificationSink},
    price_client::PriceSource,
};

pub struct StaticPrices {
    prices: Mutex<HashMap<String, Option<f64>>>,
    calls: Mutex<Vec<String>>,
}

impl StaticPrices {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: Mutex::new(
                prices
                    .iter()
                    .map(|(s, p)| (s.to_string(), Some(*p)))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, symbol: &str, price: Option<f64>) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PriceSource for StaticPrices {
    async fn get_price(&self, symbol: &str) -> Option<f64> {
        self.calls.lock().unwrap().push(symbol.to_string());
        self.prices
            .lock()
            .unwrap()
            .get(&symbol.to_uppercase())
            .copied()
            .flatten()
    }
}

pub struct StaticNews(pub Vec<Headline>);

#[async_trait]
impl NewsSource for StaticNews {
    async fn get_headlines(&self) -> Vec<Headline> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub text: String,
    pub reply_to: Option<MessageHandle>,
}

#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, text: &str, reply_to: Option<MessageHandle>) -> Result<MessageHandle> {
        let mut sent = self.sent.lock().unwrap();
        sent.push(Sent {
            text: text.to_string(),
            reply_to,
        });
        Ok(MessageHandle(sent.len() as u64))
    }
}

pub struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn send(&self, _text: &str, _reply_to: Option<MessageHandle>) -> Result<MessageHandle> {
        Err(anyhow!("transport unavailable"))
    }
}

/// Accepts a message and never finishes delivering it.
#[derive(Default)]
pub struct HangingSink {
    attempts: AtomicUsize,
}

impl HangingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for HangingSink {
    async fn send(&self, _text: &str, _reply_to: Option<MessageHandle>) -> Result<MessageHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

pub struct Server {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

/// Answers every request with `200 OK` and `body`.
pub async fn serve(body: &str) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let body = body.to_string();

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );

            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Server { url, hits }
}

/// Accepts connections and never answers.
pub async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    url
}

fn slug(title: &str) -> String {
    title.to_lowercase().replace(' ', "-")
}

pub fn rss_feed(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .map(|t| {
            format!(
                "<item><title>{t}</title><link>https://news.example.com/{}</link>\
                 <description>About {t}</description></item>",
                slug(t)
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test</title><link>https://news.example.com</link><description>Test feed</description>{items}</channel></rss>"#
    )
}

pub fn atom_feed(titles: &[&str]) -> String {
    let entries: String = titles
        .iter()
        .map(|t| {
            format!(
                "<entry><title>{t}</title><id>urn:{}</id><updated>2024-03-01T12:00:00Z</updated>\
                 <link href=\"https://news.example.com/{}\"/><summary>About {t}</summary></entry>",
                slug(t),
                slug(t)
            )
        })
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><feed xmlns="http://www.w3.org/2005/Atom"><title>Test</title><id>urn:test</id><updated>2024-03-01T12:00:00Z</updated>{entries}</feed>"#
    )
}
