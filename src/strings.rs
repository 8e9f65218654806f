//! Bilingual operational log strings
//!
//! The host UI displays server logs in English or Chinese depending on the
//! configured language index (0 = English, anything else = Chinese).

/// Log string table selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    En,
    Zh,
}

impl Lang {
    pub fn from_index(index: u8) -> Self {
        if index == 0 {
            Lang::En
        } else {
            Lang::Zh
        }
    }
}

fn pick(lang: Lang, en: &'static str, zh: &'static str) -> &'static str {
    match lang {
        Lang::En => en,
        Lang::Zh => zh,
    }
}

pub fn server_started(lang: Lang, port: u16, threads: usize) -> String {
    match lang {
        Lang::En => format!("Server started. Port: {port}, Threads: {threads}"),
        Lang::Zh => format!("服务已启动，端口：{port}，并发线程数：{threads}"),
    }
}

pub fn server_stopped(lang: Lang) -> &'static str {
    pick(lang, "Server stopped", "服务已停止")
}

pub fn request_received(lang: Lang) -> &'static str {
    pick(lang, "Request received: ", "收到请求: ")
}

pub fn invalid_key(lang: Lang) -> &'static str {
    pick(lang, "Error: Invalid API Key", "错误：API 密钥无效")
}

pub fn invalid_format(lang: Lang) -> &'static str {
    pick(lang, "Error: Invalid Response Format", "错误：响应格式无效")
}

pub fn json_error(lang: Lang) -> &'static str {
    pick(lang, "Error: JSON Parse Error", "错误：JSON 解析失败")
}

pub fn new_term(lang: Lang) -> &'static str {
    pick(lang, "✨ New Term Discovered: ", "✨ 发现新术语: ")
}

pub fn retry_attempt(lang: Lang, attempt: usize, max: usize) -> String {
    match lang {
        Lang::En => format!("🔄 Retry translation ({attempt}/{max}): "),
        Lang::Zh => format!("🔄 重试翻译 ({attempt}/{max}): "),
    }
}

pub fn retry_success(lang: Lang) -> &'static str {
    pick(lang, "✅ Retry successful", "✅ 重试成功")
}

pub fn retry_failed(lang: Lang) -> &'static str {
    pick(lang, "❌ Retry failed, skipping text", "❌ 重试失败，跳过文本")
}

pub fn aborted(lang: Lang) -> &'static str {
    pick(lang, "⛔ Translation Aborted", "⛔ 翻译已终止")
}

pub fn contexts_cleared(lang: Lang) -> &'static str {
    pick(lang, "🧹 Context memory cleared.", "🧹 上下文记忆已清空。")
}
