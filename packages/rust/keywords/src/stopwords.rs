//! Bilingual stop-word list.

use std::collections::HashSet;
use std::sync::LazyLock;

const ENGLISH: &[&str] = &[
    "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more", "most", "my", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "ours", "out",
    "over", "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "would", "you", "your", "yours",
];

const CHINESE: &[&str] = &[
    "的", "了", "和", "是", "在", "我", "有", "就", "不", "人", "都", "一", "一个", "上", "也",
    "很", "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这", "那", "这个",
    "那个", "我们", "你们", "他们", "她们", "它们", "什么", "怎么", "为什么", "因为", "所以",
    "但是", "而且", "或者", "如果", "虽然", "然后", "可以", "已经", "正在", "还是", "就是", "这样",
    "那样", "这些", "那些", "以及", "通过", "进行", "对于", "关于", "其中", "之一", "非常", "更加",
    "一些", "一种", "不是", "没", "被", "把", "让", "给", "从", "向", "与", "及", "等", "中",
];

static STOP_WORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ENGLISH.iter().chain(CHINESE).copied().collect());

/// `token` must already be lower-cased.
pub(crate) fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(token)
}
