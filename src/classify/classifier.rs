//! Tag- and type-based node classification.
//!
//! # Design Decisions
//! - Pattern tiers are plain data, checked in a fixed order
//! - Service and functional tiers match the cleaned, lowercased tag; the
//!   region tier matches the original tag so flag emoji still count
//! - Pure functions: same `(tag, type)` always yields the same group

use std::fmt;

use regex::{Regex, RegexSet};
use serde::{Serialize, Serializer};

/// Display group an outbound belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupName {
    Proxy,
    ApplicationRouting,
    NodeFilter,
    /// Any other outbound type, grouped under its literal type name.
    Type(String),
    /// Placeholder emitted when nothing else qualifies.
    Default,
}

impl GroupName {
    pub fn as_str(&self) -> &str {
        match self {
            GroupName::Proxy => "proxy",
            GroupName::ApplicationRouting => "application routing",
            GroupName::NodeFilter => "node filter",
            GroupName::Type(kind) if kind.is_empty() => "unknown",
            GroupName::Type(kind) => kind,
            GroupName::Default => "default",
        }
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for GroupName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

const PROXY_PROTOCOLS: [&str; 11] = [
    "shadowsocks",
    "vmess",
    "vless",
    "trojan",
    "wireguard",
    "hysteria",
    "hysteria2",
    "tuic",
    "ssh",
    "shadowtls",
    "shadowsocksr",
];

const BUILTIN_TYPES: [&str; 3] = ["direct", "block", "dns"];

const LOGICAL_TYPES: [&str; 3] = ["selector", "urltest", "loadbalance"];

lazy_static::lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\p{L}\p{N}\s-]").unwrap();

    static ref SERVICE_PATTERNS: RegexSet = RegexSet::new([
        // Selection and rule groups
        r"(?i)(节点选择|自定义规则|选择|规则|漏网之鱼)",
        // Messaging
        r"(?i)(telegram|电报|消息|wechat|微信|qq|whatsapp|discord|signal)",
        // Tech companies
        r"(?i)(apple|苹果|服务|microsoft|微软|google|谷歌|amazon|亚马逊|docker|github|gitlab)",
        // Search
        r"(?i)(bing|必应|baidu|百度|yahoo|雅虎|duckduckgo|yandex|搜狗|sogou|360搜索)",
        // Video
        r"(?i)(youtube|油管|netflix|奈飞|disney|迪士尼|hulu|amazon\s*prime|爱奇艺|iqiyi|优酷|youku|腾讯视频|tencent\s*video|哔哩哔哩|bilibili|抖音|douyin|快手|kuaishou|西瓜视频|xigua|好看视频|haokan)",
        // Social
        r"(?i)(twitter|推特|facebook|脸书|instagram|ins|tiktok|抖音|linkedin|snapchat|pinterest|tumblr|clubhouse|weibo|微博|知乎|zhihu|reddit)",
        // Music
        r"(?i)(spotify|apple\s*music|amazon\s*music|youtube\s*music|网易云音乐|netease|qq音乐|酷狗|kugou|酷我|kuwo|虾米|xiami|pandora|soundcloud)",
        // AI and developer sites
        r"(?i)(openai|chatgpt|claude|gemini|bard|bitbucket|stackoverflow|掘金|juejin|csdn|博客园|cnblogs|简书|jianshu|segmentfault)",
        // Gaming and streaming
        r"(?i)(steam|epic|uplay|origin|battle\.net|暴雪|blizzard|xbox|playstation|nintendo|任天堂|twitch|直播|live|斗鱼|douyu|虎牙|huya|bilibili直播)",
        // Shopping
        r"(?i)(taobao|淘宝|tmall|天猫|jd|京东|ebay|alibaba|阿里巴巴|拼多多|pinduoduo|苏宁|suning|国美|gome|唯品会|vip)",
        // Local services and travel
        r"(?i)(meituan|美团|dianping|大众点评|eleme|饿了么|didi|滴滴|uber|优步|airbnb|booking|携程|ctrip|去哪儿|qunar|马蜂窝|mafengwo)",
        // Payments and banks
        r"(?i)(alipay|支付宝|wechat\s*pay|微信支付|paypal|visa|mastercard|银联|unionpay|招商银行|cmb|工商银行|icbc|建设银行|ccb|农业银行|abc|中国银行|boc)",
        // News
        r"(?i)(cnn|bbc|fox|reuters|路透|bloomberg|彭博|wsj|华尔街日报|nytimes|纽约时报|guardian|卫报|新浪|sina|搜狐|sohu|网易|netease|凤凰|ifeng|人民网|xinhua|新华)",
        // Cloud and CDN
        r"(?i)(cloudflare|aws|azure|gcp|阿里云|aliyun|腾讯云|qcloud|百度云|baiducloud|华为云|huaweicloud|七牛|qiniu|又拍云|upyun)",
        // Education
        r"(?i)(coursera|udemy|edx|khan\s*academy|可汗学院|慕课|mooc|网易云课堂|腾讯课堂|学而思|xueersi|新东方|xdf|好未来|tal)",
        // Office
        r"(?i)(office|word|excel|powerpoint|outlook|teams|zoom|钉钉|dingtalk|企业微信|wework|slack|notion|trello|asana|monday|石墨|shimo|腾讯文档|tencent\s*docs)",
        // Tools
        r"(?i)(cursor|speedtest|测速)",
    ])
    .unwrap();

    static ref REGION_PATTERNS: RegexSet = RegexSet::new([
        "🇭🇰|🇯🇵|🇺🇸|🇸🇬|🇹🇼|🇬🇧|🇩🇪|🇰🇷|🇨🇦|🇦🇺|🇫🇷|🇳🇱|🇷🇺|🇮🇳|🇨🇳|🇹🇭|🇲🇾|🇮🇩|🇵🇭|🇻🇳|🇧🇷|🇦🇷|🇲🇽|🇨🇱|🇿🇦|🇪🇬|🇳🇬|🇰🇪|🇮🇱|🇸🇦|🇦🇪|🇹🇷|🇬🇷|🇮🇹|🇪🇸|🇵🇹|🇸🇪|🇳🇴|🇩🇰|🇫🇮|🇵🇱|🇨🇿|🇭🇺|🇷🇴|🇧🇬|🇭🇷|🇸🇮|🇸🇰|🇱🇹|🇱🇻|🇪🇪|🇺🇦|🇧🇾|🇲🇩|🇷🇸|🇧🇦|🇲🇰|🇦🇱|🇲🇪|🇮🇸|🇮🇪|🇱🇺|🇧🇪|🇨🇭|🇦🇹|🇱🇮|🇲🇨|🇸🇲|🇻🇦|🇲🇹|🇨🇾|🦁",
        r"(?i)(香港|日本|美国|新加坡|台湾|英国|德国|韩国|加拿大|澳洲|法国|荷兰|俄罗斯|印度|中国|泰国|马来西亚|印尼|菲律宾|越南|巴西|阿根廷|墨西哥|智利|南非|埃及|尼日利亚|肯尼亚|以色列|沙特|阿联酋|土耳其|希腊|意大利|西班牙|葡萄牙|瑞典|挪威|丹麦|芬兰|波兰|捷克|匈牙利|罗马尼亚|保加利亚|克罗地亚|斯洛文尼亚|斯洛伐克|立陶宛|拉脱维亚|爱沙尼亚|乌克兰|白俄罗斯|摩尔多瓦|塞尔维亚|波黑|马其顿|阿尔巴尼亚|黑山|冰岛|爱尔兰|卢森堡|比利时|瑞士|奥地利|狮城)",
        r"(?i)(hk|jp|us|sg|tw|uk|de|kr|ca|au|fr|nl|ru|in|cn|th|my|id|ph|vn|br|ar|mx|cl|za|eg|ng|ke|il|sa|ae|tr|gr|it|es|pt|se|no|dk|fi|pl|cz|hu|ro|bg|hr|si|sk|lt|lv|ee|ua|by|md|rs|ba|mk|al|me|is|ie|lu|be|ch|at)",
        r"(?i)(hong\s*kong|japan|america|singapore|taiwan|britain|germany|korea|canada|australia|france|netherlands|russia|india|china|thailand|malaysia|indonesia|philippines|vietnam|brazil|argentina|mexico|chile|africa|egypt|nigeria|kenya|israel|saudi|emirates|turkey|greece|italy|spain|portugal|sweden|norway|denmark|finland|poland|czech|hungary|romania|bulgaria|croatia|slovenia|slovakia|lithuania|latvia|estonia|ukraine|belarus|moldova|serbia|bosnia|macedonia|albania|montenegro|iceland|ireland|luxembourg|belgium|switzerland|austria)",
        r"(?i)(达拉斯|洛杉矶|圣何塞|东京|大阪|悉尼|墨尔本|伦敦|巴黎|柏林|法兰克福|阿姆斯特丹|苏黎世|维也纳|布鲁塞尔|马德里|巴塞罗那|罗马|米兰|斯德哥尔摩|哥本哈根|赫尔辛基|华沙|布拉格|布达佩斯|布加勒斯特|索菲亚|萨格勒布|卢布尔雅那|里斯本|都柏林|雷克雅未克)",
    ])
    .unwrap();

    // "选择" is matched by the service tier instead.
    static ref FUNCTIONAL_PATTERNS: RegexSet =
        RegexSet::new([r"(?i)(手动|自动|自建|代理|proxy|manual|auto)"]).unwrap();
}

pub fn is_proxy_protocol(kind: &str) -> bool {
    PROXY_PROTOCOLS.contains(&kind)
}

/// Engine built-ins never shown in node groups.
pub fn is_builtin(kind: &str) -> bool {
    BUILTIN_TYPES.contains(&kind)
}

/// Selector-style outbounds that pick among other outbounds.
pub fn is_logical(kind: &str) -> bool {
    LOGICAL_TYPES.contains(&kind)
}

/// Tag heuristics alone. Always yields `ApplicationRouting` or `NodeFilter`.
pub fn classify_tag(tag: &str) -> GroupName {
    let cleaned = NON_WORD.replace_all(tag, " ");
    let cleaned = cleaned.trim().to_lowercase();

    if SERVICE_PATTERNS.is_match(&cleaned) {
        return GroupName::ApplicationRouting;
    }
    if REGION_PATTERNS.is_match(tag) {
        return GroupName::NodeFilter;
    }
    if FUNCTIONAL_PATTERNS.is_match(&cleaned) {
        return GroupName::ApplicationRouting;
    }
    GroupName::NodeFilter
}

/// Classify a node: proxy protocols bypass the tag heuristics.
pub fn classify(tag: &str, declared_type: &str) -> GroupName {
    if is_proxy_protocol(declared_type) {
        GroupName::Proxy
    } else {
        classify_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_protocol_bypass() {
        assert_eq!(classify("Japan", "vmess"), GroupName::Proxy);
        assert_eq!(classify("Telegram", "trojan"), GroupName::Proxy);
        assert_eq!(classify("自动选择", "hysteria2"), GroupName::Proxy);
    }

    #[test]
    fn test_service_tier_wins() {
        assert_eq!(classify("Telegram", "selector"), GroupName::ApplicationRouting);
        assert_eq!(classify_tag("🎬 Netflix"), GroupName::ApplicationRouting);
        assert_eq!(classify_tag("自动选择"), GroupName::ApplicationRouting);
    }

    #[test]
    fn test_region_tier() {
        assert_eq!(classify("🇯🇵 Japan", "selector"), GroupName::NodeFilter);
        assert_eq!(classify_tag("香港 01"), GroupName::NodeFilter);
        assert_eq!(classify_tag("🦁"), GroupName::NodeFilter);
    }

    #[test]
    fn test_functional_tier() {
        assert_eq!(classify_tag("自建"), GroupName::ApplicationRouting);
        assert_eq!(classify_tag("手动"), GroupName::ApplicationRouting);
    }

    #[test]
    fn test_fallback_is_node_filter() {
        assert_eq!(classify_tag("⚡"), GroupName::NodeFilter);
        assert_eq!(classify_tag(""), GroupName::NodeFilter);
    }

    #[test]
    fn test_classification_is_deterministic() {
        for tag in ["Telegram", "🇺🇸 US 02", "自建", "香港 01"] {
            assert_eq!(classify_tag(tag), classify_tag(tag));
        }
    }

    #[test]
    fn test_type_predicates() {
        assert!(is_builtin("dns"));
        assert!(!is_builtin("selector"));
        assert!(is_logical("urltest"));
        assert!(is_proxy_protocol("shadowsocksr"));
        assert!(!is_proxy_protocol("selector"));
    }

    #[test]
    fn test_group_name_text() {
        assert_eq!(GroupName::ApplicationRouting.as_str(), "application routing");
        assert_eq!(GroupName::Type("http".into()).as_str(), "http");
        assert_eq!(GroupName::Type(String::new()).as_str(), "unknown");
        assert_eq!(
            serde_json::to_value(GroupName::NodeFilter).unwrap(),
            serde_json::json!("node filter")
        );
    }
}
