// Sample input for highlighter tests.
use std::collections::HashMap;

/* A block comment
   spanning two lines. */
pub struct Counter {
    counts: HashMap<String, u32>,
    limit: u32,
}

impl Counter {
    pub fn new(limit: u32) -> Self {
        Self {
            counts: HashMap::new(),
            limit,
        }
    }

    // Returns the new count, saturating at the limit.
    pub fn bump(&mut self, key: &str) -> u32 {
        let entry = self.counts.entry(key.to_string()).or_insert(0);
        if *entry < self.limit {
            *entry += 1;
        }
        *entry
    }

    pub fn total(&self) -> u32 {
        let mut sum = 0;
        for value in self.counts.values() {
            sum += value;
        }
        return sum;
    }
}

fn describe(counter: &Counter, key: &str) -> String {
    let label = "count";
    let value = counter.counts.get(key).copied().unwrap_or(0);
    format!("{key}: {label} = {value}")
}

fn main() {
    let mut counter = Counter::new(3);
    for word in ["alpha", "beta", "alpha", "gamma", "alpha", "alpha"] {
        counter.bump(word);
    }
    let answer = 42;
    println!("{}", describe(&counter, "alpha"));
    println!("total = {}, answer = {answer}", counter.total());
}
