use crate::chain::{HttpCachingChain, HttpChain};
use crate::chain_info::ChainInfo;
use crate::client::{ChainClient, HttpChainClient};
use crate::config::{ChainOptions, SpeedTestOptions};
use crate::http::HttpOptions;
use crate::speedtest::{SpeedTest, MAX_COST};
use crate::verify::{Beacon, SignatureVerifier};
use crate::{DrandClientError, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// A client over several nodes serving the same chain that routes every request to the
/// node with the lowest measured latency.
///
/// Each node is probed by fetching (and verifying) its chain info, so a node reporting
/// the wrong chain looks as slow as one that is down. With a single base URL no probing
/// happens at all.
pub struct FastestNodeClient<T: Transport + Clone + 'static> {
    nodes: Vec<Node<T>>,
    options: ChainOptions,
}

struct Node<T: Transport> {
    client: HttpChainClient<T>,
    speed_test: Option<SpeedTest>,
}

impl<T: Transport + Clone + 'static> FastestNodeClient<T> {
    pub fn new<U: Into<String>>(
        base_urls: impl IntoIterator<Item = U>,
        transport: T,
        options: ChainOptions,
    ) -> Result<Self, DrandClientError> {
        FastestNodeClient::with_settings(
            base_urls,
            transport,
            options,
            HttpOptions::default(),
            SpeedTestOptions::default(),
        )
    }

    pub fn with_settings<U: Into<String>>(
        base_urls: impl IntoIterator<Item = U>,
        transport: T,
        options: ChainOptions,
        http_options: HttpOptions,
        speed_test_options: SpeedTestOptions,
    ) -> Result<Self, DrandClientError> {
        let base_urls: Vec<String> = base_urls.into_iter().map(Into::into).collect();
        if base_urls.is_empty() {
            return Err(DrandClientError::NoBaseUrls);
        }
        if base_urls.len() == 1 {
            warn!("there was only a single base URL in the FastestNodeClient - you should just use an HttpChainClient");
        }
        let probe_nodes = base_urls.len() > 1;

        let nodes = base_urls
            .into_iter()
            .map(|base_url| {
                let speed_test = probe_nodes.then(|| {
                    let probe = Arc::new(
                        HttpChain::new(base_url.clone(), transport.clone(), options.clone())
                            .with_http_options(http_options.clone()),
                    );
                    SpeedTest::with_options(
                        move || {
                            let probe = Arc::clone(&probe);
                            async move { probe.info().await.map(|_| ()) }
                        },
                        &speed_test_options,
                    )
                });
                let chain = HttpCachingChain::new(base_url, transport.clone(), options.clone())
                    .with_http_options(http_options.clone());
                Node {
                    client: HttpChainClient::new(chain, options.clone()),
                    speed_test,
                }
            })
            .collect();

        Ok(FastestNodeClient { nodes, options })
    }

    /// use another signature verifier for every node
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.nodes = self
            .nodes
            .into_iter()
            .map(|node| Node {
                client: node.client.with_verifier(Arc::clone(&verifier)),
                speed_test: node.speed_test,
            })
            .collect();
        self
    }

    /// Start probing every node.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        for speed_test in self.nodes.iter_mut().filter_map(|node| node.speed_test.as_mut()) {
            speed_test.start();
        }
    }

    pub fn stop(&mut self) {
        for speed_test in self.nodes.iter_mut().filter_map(|node| node.speed_test.as_mut()) {
            speed_test.stop();
        }
    }

    /// the number of nodes being measured; zero when there is a single base URL
    pub fn speed_test_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.speed_test.is_some())
            .count()
    }

    /// The client for the node with the lowest average cost. Ties, including every node
    /// currently failing, go to the earliest base URL.
    pub fn current(&self) -> &HttpChainClient<T> {
        let fastest = self.nodes.iter().min_by_key(|node| {
            node.speed_test
                .as_ref()
                .map_or(MAX_COST, SpeedTest::average)
        });
        match fastest {
            Some(node) => &node.client,
            // non-empty by construction
            None => &self.nodes[0].client,
        }
    }

    pub fn current_base_url(&self) -> &str {
        self.current().base_url()
    }

    pub fn base_urls(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.client.base_url())
    }
}

#[async_trait]
impl<T: Transport + Clone + 'static> ChainClient for FastestNodeClient<T> {
    fn options(&self) -> &ChainOptions {
        &self.options
    }

    fn base_url(&self) -> &str {
        self.current_base_url()
    }

    async fn chain_info(&self) -> Result<Arc<ChainInfo>, DrandClientError> {
        self.current().chain_info().await
    }

    async fn latest(&self) -> Result<Beacon, DrandClientError> {
        self.current().latest().await
    }

    async fn get(&self, round_number: u64) -> Result<Beacon, DrandClientError> {
        self.current().get(round_number).await
    }
}
