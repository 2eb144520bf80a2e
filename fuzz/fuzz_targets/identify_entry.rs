#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use jarsniff_crawler::{
    CrawlerConfig, Identifier, Identify, NodeContent, ReaderRegistry, ScanNode,
};
use libfuzzer_sys::fuzz_target;
use tokio_util::sync::CancellationToken;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    name: String,
    depth: u8,
    content: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    let config = CrawlerConfig::default();
    let Ok(identifier) = Identifier::new(&config, Arc::new(ReaderRegistry::default())) else {
        return;
    };
    let node = ScanNode {
        path: input.name.clone(),
        name: &input.name,
        size: input.content.len() as u64,
        modified: None,
        depth: usize::from(input.depth % 4),
        content: NodeContent::Memory(&input.content),
    };

    if let Ok(identification) = identifier.identify(&node, &CancellationToken::new()) {
        // 증거 조합은 항상 일관되어야 함
        assert!(identification.finding.is_consistent());
        if identification.finding.is_empty() {
            assert!(identification.cves().is_empty());
        }
    }
});
