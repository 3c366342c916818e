use console::Style;
use std::io::{self, Write};

use memo_types::{BackendKind, Category, Memo, MemoStats, Priority};

/// 命令行输出格式化工具
/// 提供统一的 Cargo 风格输出
pub struct Output {
    green: Style,
    bold: Style,
    dim: Style,
}

impl Output {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            bold: Style::new().bold(),
            dim: Style::new().dim(),
        }
    }

    /// 显示状态消息
    /// 格式: "    Updating memo 12"（动词右对齐到 12 字符）
    pub fn status(&self, action: &str, target: &str) {
        eprintln!("{:>12} {}", self.green.apply_to(action), target);
    }

    /// 开始执行操作的状态消息（会在前面自动添加空行）
    /// 用于标记用户确认后的实际执行
    pub fn begin_operation(&self, action: &str, target: &str) {
        eprintln!();
        eprintln!("{:>12} {}", self.green.apply_to(action), target);
    }

    /// 显示存储信息
    /// 格式: "     Storage mobile-local (12 memos)"
    /// 自动在后面添加空行
    pub fn storage_info(&self, kind: BackendKind, memo_count: usize) {
        eprintln!(
            "{:>12} {} {}",
            self.green.apply_to("Storage"),
            kind,
            self.dim.apply_to(format!("({} memos)", memo_count))
        );
        eprintln!();
    }

    /// 显示创建/查找资源消息
    /// 格式: "    Creating config at /path/to/config"
    pub fn resource_action(&self, action: &str, resource: &str, path: &std::path::Path) {
        eprintln!(
            "{:>12} {} at {}",
            self.green.apply_to(action),
            resource,
            path.display()
        );
    }

    /// 显示完成消息
    /// 格式: "    Finished action for scope"
    /// 自动在前面添加空行
    pub fn finish(&self, action: &str, scope: &str) {
        eprintln!();
        eprintln!(
            "{:>12} {} for {} scope",
            self.green.apply_to("Finished"),
            action,
            scope
        );
    }

    /// 显示单个备忘（列表项格式）
    /// 格式: "[1/5] 12 Fix login (2024-05-01 10:00) bug/high [auth, ui]"
    ///       "      Content line 1"
    fn memo_item(&self, index: usize, total: usize, memo: &Memo) {
        let index_part = format!("{}/{}", index, total);

        let tags_part = if memo.tags.is_empty() {
            String::new()
        } else {
            format!(" {}", self.dim.apply_to(format!("[{}]", memo.tags.join(", "))))
        };

        println!(
            "[{}] {} {} {} {}{}",
            self.dim.apply_to(&index_part),
            self.bold.apply_to(&memo.id),
            memo.title,
            self.dim.apply_to(format!("({})", memo.updated_at.format("%Y-%m-%d %H:%M"))),
            self.label(memo.category, memo.priority),
            tags_part
        );

        // 内容与 ID 对齐：[index_part] + 空格
        let indent = " ".repeat(index_part.len() + 3);
        for line in memo.content.lines() {
            println!("{}{}", indent, line);
        }
    }

    /// 显示备忘列表（自动处理分隔和格式化）
    pub fn memo_list(&self, memos: &[Memo]) {
        let total = memos.len();
        for (i, memo) in memos.iter().enumerate() {
            self.memo_item(i + 1, total, memo);

            // 只在非最后一个结果后添加空行分隔
            if i + 1 < total {
                println!();
            }
        }
    }

    /// 显示单个备忘的全部字段
    pub fn memo_detail(&self, memo: &Memo) {
        println!("{:>12} {}", self.dim.apply_to("ID"), self.bold.apply_to(&memo.id));
        println!("{:>12} {}", self.dim.apply_to("Title"), memo.title);
        println!(
            "{:>12} {}",
            self.dim.apply_to("Kind"),
            self.label(memo.category, memo.priority)
        );
        if !memo.tags.is_empty() {
            println!("{:>12} {}", self.dim.apply_to("Tags"), memo.tags.join(", "));
        }
        println!(
            "{:>12} {}",
            self.dim.apply_to("Created"),
            memo.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!(
            "{:>12} {}",
            self.dim.apply_to("Updated"),
            memo.updated_at.format("%Y-%m-%d %H:%M:%S")
        );
        if !memo.content.is_empty() {
            println!();
            for line in memo.content.lines() {
                println!("{:>12} {}", "", line);
            }
        }
    }

    /// 显示统计信息
    pub fn memo_stats(&self, stats: &MemoStats) {
        let rows = [
            ("Total", stats.total),
            ("Bugs", stats.bugs),
            ("Features", stats.features),
            ("Ideas", stats.ideas),
            ("Notes", stats.notes),
            ("Todos", stats.todos),
            ("High", stats.high_priority),
        ];
        for (name, count) in rows {
            println!("{:>12} {}", self.green.apply_to(name), count);
        }
    }

    /// 分类/优先级标签，高优先级加粗标红
    fn label(&self, category: Category, priority: Priority) -> String {
        let text = format!("{}/{}", category, priority);
        match priority {
            Priority::High => Style::new().red().bold().apply_to(text).to_string(),
            Priority::Medium => Style::new().yellow().apply_to(text).to_string(),
            Priority::Low => self.dim.apply_to(text).to_string(),
        }
    }

    /// 显示注意事项（右对齐）
    pub fn note(&self, message: &str) {
        eprintln!("{:>12} {}", self.dim.apply_to("Note"), message);
    }

    /// 显示警告（黄色，右对齐）
    pub fn warning(&self, message: &str) {
        eprintln!(
            "{:>12} {}",
            Style::new().yellow().bold().apply_to("Warning"),
            message
        );
    }

    /// 显示提示消息（标准输出，右对齐）
    pub fn info(&self, message: &str) {
        println!("{:>12} {}", "", message);
    }

    /// 显示确认提示并读取用户输入
    /// 返回用户是否输入了 expected
    pub fn confirm(&self, expected: &str) -> io::Result<bool> {
        print!(
            "{:>12} Type {} to confirm: ",
            "",
            Style::new().green().bold().apply_to(expected)
        );
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        Ok(input.trim() == expected)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
