pub struct TableText {
  pub lines: Vec<String>,
}

impl TableText {
  pub fn render(&self, indent: u16) -> String {
    let indent_text = " ".repeat(indent as usize);
    self.lines.iter().map(|line| format!("{}{}", indent_text, line)).collect::<Vec<_>>().join("\n")
  }
}

/// Aligns each column to the widest cell in that column.
pub fn get_table_text(rows: Vec<Vec<&str>>) -> TableText {
  let column_count = rows.iter().map(|row| row.len()).max().unwrap_or(0);
  let column_widths = (0..column_count)
    .map(|column| get_largest_string_len(rows.iter().filter_map(|row| row.get(column).copied())))
    .collect::<Vec<_>>();

  let lines = rows
    .iter()
    .map(|row| {
      let mut text = String::new();
      for (i, cell) in row.iter().enumerate() {
        text.push_str(cell);
        if i + 1 < row.len() {
          text.push_str(&" ".repeat(column_widths[i] - cell.chars().count() + 1));
        }
      }
      text
    })
    .collect();

  TableText { lines }
}

fn get_largest_string_len<'a>(items: impl Iterator<Item = &'a str>) -> usize {
  let mut key_lens = items.map(|item| item.chars().count()).collect::<Vec<_>>();
  key_lens.sort_unstable();
  key_lens.pop().unwrap_or(0)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn aligns_columns() {
    let table = get_table_text(vec![vec!["gofmt", "/a", "/usr/bin/gofmt"], vec!["goimports", "/long/root", "/go/bin/goimports"]]);
    assert_eq!(
      table.render(2),
      concat!("  gofmt     /a         /usr/bin/gofmt\n", "  goimports /long/root /go/bin/goimports",)
    );
  }
}
