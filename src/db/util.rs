// SQL builders for the simple per-table statements.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnNote {
  /// Generated by the database, skipped on insert.
  Generated,
  None,
}

#[derive(Debug, Clone)]
pub struct ColumnMapper {
  pub name: String,
  pub note: ColumnNote,
}

pub fn column(name: &'static str) -> ColumnMapper {
  ColumnMapper {
    name: name.to_string(),
    note: ColumnNote::None,
  }
}

pub fn generated(name: &'static str) -> ColumnMapper {
  ColumnMapper {
    name: name.to_string(),
    note: ColumnNote::Generated,
  }
}

#[derive(Debug, Default, Clone)]
pub struct ColumnMappers {
  pub table_name: &'static str,
  pub columns: Vec<ColumnMapper>,
}

impl ColumnMappers {
  fn names(&self, all_columns: bool) -> Vec<&str> {
    self.columns.iter()
      .filter(|col| all_columns || col.note != ColumnNote::Generated)
      .map(|col| col.name.as_str())
      .collect()
  }

  pub fn get_columns(&self) -> String {
    self.names(true).join(", ")
  }

  /// `SELECT <all columns> FROM <table>`
  pub fn build_select_query(&self) -> String {
    format!("SELECT {} FROM {}", self.get_columns(), self.table_name)
  }

  /// `INSERT INTO <table>(<writable columns>) VALUES($1, ..) RETURNING <all columns>`
  pub fn build_insert_returning(&self) -> String {
    let names = self.names(false);
    let values = (1..=names.len())
      .map(|idx| format!("${}", idx))
      .collect::<Vec<_>>()
      .join(", ");
    format!("INSERT INTO {}({}) VALUES({}) RETURNING {}",
      self.table_name, names.join(", "), values, self.get_columns())
  }

  /// `UPDATE <table> SET <col> = $2 WHERE <lookup> = $1 RETURNING <all columns>`
  pub fn build_set_flag(&self, lookup: &str, flag: &str) -> String {
    format!("UPDATE {} SET {} = $2 WHERE {} = $1 RETURNING {}",
      self.table_name, flag, lookup, self.get_columns())
  }

  /// `UPDATE <table> SET <col> = <col> + 1 WHERE <lookup> = $1 RETURNING <all columns>`
  pub fn build_increment(&self, lookup: &str, counter: &str) -> String {
    format!("UPDATE {} SET {} = {} + 1 WHERE {} = $1 RETURNING {}",
      self.table_name, counter, counter, lookup, self.get_columns())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn contacts() -> ColumnMappers {
    ColumnMappers {
      table_name: "contact_messages",
      columns: vec![
        generated("id"),
        column("name"),
        column("email"),
        generated("sent_at"),
      ],
    }
  }

  #[test]
  fn select_lists_every_column() {
    assert_eq!(contacts().build_select_query(),
      "SELECT id, name, email, sent_at FROM contact_messages");
  }

  #[test]
  fn insert_skips_generated_columns() {
    assert_eq!(contacts().build_insert_returning(),
      "INSERT INTO contact_messages(name, email) VALUES($1, $2) RETURNING id, name, email, sent_at");
  }

  #[test]
  fn increment_bumps_in_place() {
    assert_eq!(contacts().build_increment("id", "clicks"),
      "UPDATE contact_messages SET clicks = clicks + 1 WHERE id = $1 RETURNING id, name, email, sent_at");
  }

  #[test]
  fn set_flag_updates_one_column() {
    assert_eq!(contacts().build_set_flag("id", "read"),
      "UPDATE contact_messages SET read = $2 WHERE id = $1 RETURNING id, name, email, sent_at");
  }
}
