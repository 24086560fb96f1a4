use std::collections::{BTreeMap, HashMap};

#[derive(PartialEq, Debug, Clone)]
pub struct EndpointConfig {
    pub path_only: bool,
    pub strip_keys: Vec<String>,
    /// Endpoints hit this often or less are only summarized
    pub threshold: usize,
}

impl Default for EndpointConfig {
    fn default() -> EndpointConfig {
        EndpointConfig {
            path_only: false,
            strip_keys: Vec::new(),
            threshold: 1,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct EndpointTable {
    /// Most hit first
    pub visible: Vec<(String, usize)>,
    /// Hit count to number of endpoints hidden with that count
    pub hidden: BTreeMap<usize, usize>,
}

pub struct EndpointCounter {
    config: EndpointConfig,
    hits: HashMap<String, usize>,
}

impl EndpointCounter {
    pub fn new(config: EndpointConfig) -> EndpointCounter {
        EndpointCounter {
            config,
            hits: HashMap::new(),
        }
    }

    pub fn normalize(&self, url: &str) -> String {
        let (path, query) = match url.find('?') {
            Some(index) => (&url[..index], &url[index + 1..]),
            None => (url, ""),
        };

        if self.config.path_only {
            return path.to_string();
        }

        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let key = pair.split('=').next().unwrap_or("");
                !self.config.strip_keys.iter().any(|strip| strip == key)
            })
            .collect();

        if kept.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, kept.join("&"))
        }
    }

    pub fn add(&mut self, url: &str) {
        let endpoint = self.normalize(url);
        *self.hits.entry(endpoint).or_insert(0) += 1;
    }

    pub fn table(&self) -> EndpointTable {
        let mut visible: Vec<(String, usize)> = Vec::new();
        let mut hidden: BTreeMap<usize, usize> = BTreeMap::new();

        for (endpoint, count) in &self.hits {
            if *count > self.config.threshold {
                visible.push((endpoint.clone(), *count));
            } else {
                *hidden.entry(*count).or_insert(0) += 1;
            }
        }

        visible.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        EndpointTable { visible, hidden }
    }
}
