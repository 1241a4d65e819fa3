//! 诊断输出
//!
//! 后台清理没有调用方可以接收错误，失败信息写入这里（默认 stderr），
//! 格式为 `[ERROR]:<message>\n`。成功时不写任何内容。

use std::io::Write;
use std::sync::Mutex;

pub struct DiagnosticSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl DiagnosticSink {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// 替换输出目标
    pub fn replace(&self, writer: impl Write + Send + 'static) {
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Box::new(writer);
    }

    /// 写入一行错误
    pub fn error(&self, message: &str) {
        let line = format!("[ERROR]:{}\n", message);
        let mut guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        // 诊断输出失败无处可报，直接忽略
        let _ = guard.write_all(line.as_bytes());
        let _ = guard.flush();
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl std::fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosticSink").finish_non_exhaustive()
    }
}
