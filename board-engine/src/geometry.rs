//! 棋盘几何换算
//!
//! 视图坐标以棋盘左上角为原点，x 向右、y 向下。黑方朝向时整盘旋转 180 度，
//! 换算结果对外始终是标准格子。

use std::ops::{Add, Sub};

use board_core::{Square, BOARD_SIZE};

use crate::config::Orientation;

/// 视图坐标点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 到另一点的距离
    pub fn distance(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// 线性插值
    pub fn lerp(&self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// 坐标标签
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateLabel {
    pub text: char,
    /// 标签所在格子的左上角
    pub position: Point,
}

/// 棋盘布局
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardGeometry {
    /// 棋盘边长
    pub board_size: f32,
    pub orientation: Orientation,
}

impl BoardGeometry {
    pub fn new(board_size: f32, orientation: Orientation) -> Self {
        Self {
            board_size,
            orientation,
        }
    }

    /// 格子边长
    pub fn square_size(&self) -> f32 {
        self.board_size / BOARD_SIZE as f32
    }

    /// 视图中的列、行（0 起，自左上角）
    fn view_cell(&self, square: Square) -> (u8, u8) {
        let last = BOARD_SIZE as u8 - 1;
        match self.orientation {
            Orientation::White => (square.file(), last - square.rank()),
            Orientation::Black => (last - square.file(), square.rank()),
        }
    }

    /// 格子左上角的平移量，即棋子停放位置
    pub fn to_translation(&self, square: Square) -> Point {
        let (col, row) = self.view_cell(square);
        let size = self.square_size();
        Point::new(col as f32 * size, row as f32 * size)
    }

    /// 格子中心点
    pub fn centroid(&self, square: Square) -> Point {
        let half = self.square_size() / 2.0;
        self.to_translation(square) + Point::new(half, half)
    }

    /// 命中测试：视图坐标所在的格子
    pub fn square_at(&self, point: Point) -> Option<Square> {
        let size = self.square_size();
        if size <= 0.0 || point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let col = (point.x / size).floor() as usize;
        let row = (point.y / size).floor() as usize;
        if col >= BOARD_SIZE || row >= BOARD_SIZE {
            return None;
        }
        let last = BOARD_SIZE - 1;
        let (file, rank) = match self.orientation {
            Orientation::White => (col, last - row),
            Orientation::Black => (last - col, row),
        };
        Square::new(file as u8, rank as u8)
    }

    /// 棋子平移量落在哪个格子（按棋子中心判断）
    pub fn square_for_translation(&self, translation: Point) -> Option<Square> {
        let half = self.square_size() / 2.0;
        self.square_at(translation + Point::new(half, half))
    }

    /// 坐标标签：底行显示列字母，左列显示行号
    pub fn coordinate_labels(&self) -> Vec<CoordinateLabel> {
        let size = self.square_size();
        let last = (BOARD_SIZE - 1) as f32;
        let mut labels = Vec::with_capacity(BOARD_SIZE * 2);

        for i in 0..BOARD_SIZE as u8 {
            let (file_char, rank_char) = match self.orientation {
                Orientation::White => ((b'a' + i) as char, (b'8' - i) as char),
                Orientation::Black => ((b'h' - i) as char, (b'1' + i) as char),
            };
            labels.push(CoordinateLabel {
                text: file_char,
                position: Point::new(i as f32 * size, last * size),
            });
            labels.push(CoordinateLabel {
                text: rank_char,
                position: Point::new(0.0, i as f32 * size),
            });
        }
        labels
    }
}
