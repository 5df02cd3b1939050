use linkdigest::fallback::parse_free_text;
use linkdigest::summary::MAX_TAGS;

const URL: &str = "https://blog.example.org/posts/async";

#[test]
fn every_field_is_populated_for_arbitrary_replies() {
    let inputs = [
        "",
        "   \n\n  ",
        "ok",
        "{\"title\": ",
        "I could not summarise this page because it appears to be empty.",
        "```json\n{\"title\": \"Half a reply\", \"summary\": \"cut off",
        "标题：异步编程\n摘要：介绍执行器和唤醒器的工作方式。\n标签：Rust、异步",
        "Key points:\n\n\nTags:\n",
        "- just\n- a\n- list\n- of\n- bullets",
        "See https://docs.rs and https://crates.io for more.",
    ];

    for input in inputs {
        let record = parse_free_text(input, URL);
        assert!(!record.title.trim().is_empty(), "title empty for {:?}", input);
        assert!(!record.summary.trim().is_empty(), "summary empty for {:?}", input);
        assert!(!record.key_points.is_empty(), "key points empty for {:?}", input);
        assert!(!record.tags.is_empty(), "tags empty for {:?}", input);
        assert!(record.tags.len() <= MAX_TAGS);
        assert!(!record.source.trim().is_empty(), "source empty for {:?}", input);
        assert_eq!(record.original_url, URL);
    }
}

#[test]
fn bare_links_are_collected_without_the_original() {
    let text = "Further reading on the topic:\n\
                https://docs.rs/tokio\n\
                The original post is at https://blog.example.org/posts/async";
    let record = parse_free_text(text, URL);

    let urls: Vec<&str> = record.related_links.iter().map(|l| l.url.as_str()).collect();
    assert_eq!(urls, vec!["https://docs.rs/tokio"]);
}

#[test]
fn source_falls_back_to_the_domain() {
    let record = parse_free_text("Summary: executors poll futures until they are ready.", URL);
    assert_eq!(record.source, "blog.example.org");
}
