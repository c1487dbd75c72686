use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::RwLock;
use probability::distribution::{Binomial, Discrete};

use crate::Error;

/// Binomial distribution B(n, p) with a precomputed upper tail
#[derive(Debug, Clone)]
pub struct BinomialDistribution {
    n: usize,
    p: f64,
    /// `tail[k]` = P(X >= k) for k in 0..=n
    tail: Option<Box<[f64]>>,
}

impl BinomialDistribution {
    pub fn new(n: usize, p: f64) -> Self {
        // B(0, p), B(n, 0) and B(n, 1) are point masses
        if n == 0 || p <= 0.0 || p >= 1.0 {
            return Self { n, p, tail: None };
        }
        let binomial = Binomial::new(n, p);
        let mut tail = vec![0.0; n + 1];
        let mut acc = 0.0;
        for x in (0..=n).rev() {
            acc += binomial.mass(x);
            tail[x] = acc.min(1.0);
        }
        Self {
            n,
            p,
            tail: Some(tail.into_boxed_slice()),
        }
    }

    /// Whether a tail table is worth keeping around
    pub fn has_table(&self) -> bool {
        self.tail.is_some()
    }

    /// P(X >= k)
    pub fn upper_tail(&self, k: usize) -> f64 {
        if k == 0 {
            return 1.0;
        }
        if k > self.n {
            return 0.0;
        }
        match &self.tail {
            Some(tail) => tail[k],
            None if self.p >= 1.0 => 1.0,
            None => 0.0,
        }
    }
}

type Entries = FnvHashMap<u64, FnvHashMap<usize, Arc<BinomialDistribution>>>;

/// Bounded cache of binomial distributions keyed by (p, n).
///
/// Capacity counts distinct values of p. When full, arbitrary p entries are
/// evicted until there is room for a new one. Reads run concurrently, inserts
/// are serialized; a reader racing an evicting writer rebuilds the
/// distribution.
#[derive(Debug)]
pub struct DistributionCache {
    capacity: usize,
    entries: RwLock<Entries>,
    built: AtomicUsize,
}

impl Default for DistributionCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl DistributionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(FnvHashMap::default()),
            built: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of distinct p values currently cached
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of distributions computed so far
    pub fn built(&self) -> usize {
        self.built.load(Ordering::Relaxed)
    }

    pub fn get(&self, p: f64, n: usize) -> Option<Arc<BinomialDistribution>> {
        self.entries
            .read()
            .get(&p.to_bits())
            .and_then(|at_p| at_p.get(&n))
            .cloned()
    }

    /// Cached distribution for (p, n), computing it on a miss
    pub fn distribution(&self, p: f64, n: usize) -> Arc<BinomialDistribution> {
        if let Some(distribution) = self.get(p, n) {
            return distribution;
        }
        let distribution = Arc::new(BinomialDistribution::new(n, p));
        self.built.fetch_add(1, Ordering::Relaxed);
        if distribution.has_table() {
            self.insert(p, n, distribution.clone());
        }
        distribution
    }

    fn insert(&self, p: f64, n: usize, distribution: Arc<BinomialDistribution>) {
        if self.capacity == 0 {
            return;
        }
        let key = p.to_bits();
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let evict = entries
                .keys()
                .take(entries.len() + 1 - self.capacity)
                .copied()
                .collect::<Vec<_>>();
            for key in evict {
                entries.remove(&key);
            }
        }
        entries.entry(key).or_default().insert(n, distribution);
    }

    /// Probability of matching at least `k` of `n` expected ions by chance,
    /// when each ion matches with probability `p`. Exactly 1 when `k` is 0.
    pub fn score(&self, p: f64, n: usize, k: usize) -> Result<f64, Error> {
        if k == 0 {
            return Ok(1.0);
        }
        Error::check_probability(p, "random match probability")?;
        if k > n || p == 0.0 {
            return Ok(0.0);
        }
        if p == 1.0 {
            return Ok(1.0);
        }
        let score = self.distribution(p, n).upper_tail(k);
        Error::check_probability(score, "binomial upper tail")
    }
}
