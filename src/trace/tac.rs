// Three-address code: the scalar triple loop the PIM program implements

use crate::memdomain::MatrixDims;

/// Loop nest over i < M, j < N, k < K with row-major flat indexing into A, B and C.
pub fn three_address_code(dims: MatrixDims) -> Vec<String> {
  let MatrixDims { m, k, n } = dims;
  let body = [
    (0, "i = 0".to_string()),
    (0, format!("L1: if i >= {} goto END_L1", m)),
    (1, "j = 0".to_string()),
    (1, format!("L2: if j >= {} goto END_L2", n)),
    (2, "sum = 0".to_string()),
    (2, "k = 0".to_string()),
    (2, format!("L3: if k >= {} goto END_L3", k)),
    (3, format!("t1 = i * {}", k)),
    (3, "t2 = t1 + k".to_string()),
    (3, format!("t3 = k * {}", n)),
    (3, "t4 = t3 + j".to_string()),
    (3, "t5 = A[t2]".to_string()),
    (3, "t6 = B[t4]".to_string()),
    (3, "t7 = t5 * t6".to_string()),
    (3, "sum = sum + t7".to_string()),
    (3, "k = k + 1".to_string()),
    (3, "goto L3".to_string()),
    (2, "END_L3:".to_string()),
    (2, format!("t8 = i * {}", n)),
    (2, "t9 = t8 + j".to_string()),
    (2, "C[t9] = sum".to_string()),
    (2, "j = j + 1".to_string()),
    (2, "goto L2".to_string()),
    (1, "END_L2:".to_string()),
    (1, "i = i + 1".to_string()),
    (1, "goto L1".to_string()),
    (0, "END_L1:".to_string()),
  ];
  body.into_iter().map(|(depth, text)| format!("{}{}", "    ".repeat(depth), text)).collect()
}

pub fn render_three_address(dims: MatrixDims) -> String {
  let mut out = String::from("# Three-Address Code for Matrix Multiplication\n# =====================================\n\n");
  for line in three_address_code(dims) {
    out.push_str(&line);
    out.push('\n');
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_loop_bounds_and_strides() {
    let code = three_address_code(MatrixDims::new(4, 3, 5));
    assert_eq!(code.len(), 27);
    assert_eq!(code[1], "L1: if i >= 4 goto END_L1");
    assert_eq!(code[3], "    L2: if j >= 5 goto END_L2");
    assert_eq!(code[6], "        L3: if k >= 3 goto END_L3");
    assert_eq!(code[7], "            t1 = i * 3");
    assert_eq!(code[9], "            t3 = k * 5");
    assert_eq!(code[18], "        t8 = i * 5");
    assert_eq!(code.last().map(String::as_str), Some("END_L1:"));
  }

  #[test]
  fn test_render_header() {
    let text = render_three_address(MatrixDims::new(2, 2, 2));
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# Three-Address Code for Matrix Multiplication"));
    assert_eq!(lines.nth(1), Some(""));
    assert_eq!(lines.next(), Some("i = 0"));
    assert!(text.contains("            t5 = A[t2]\n"));
  }
}
