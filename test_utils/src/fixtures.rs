//! Canned Lua source snippets used across `coverage_core`'s test suites.
//!
//! Unlike the large binary fixtures a report-ingestion crate needs (pulled
//! from Git LFS), everything the coverage engine's tests need is a handful of
//! lines of Lua source, so these are just `&'static str` constants.

/// A file containing nothing but blank lines and `--` comments.
pub const COMMENT_ONLY: &str = "\
-- this file has no executable code
-- just commentary

-- more commentary


--[[
  a block comment
  spanning several lines
]]

";

/// Single function, single call, no assertion. See spec.md §8 scenario 2.
pub const SINGLE_FUNCTION_SINGLE_CALL: &str = "\
local function f(x)
  if x > 0 then
    return x
  end
  return 0
end
return f(1)
";

/// A compound condition exercised with two different outcome pairs.
pub const COMPOUND_CONDITION: &str = "\
local function check(a, b)
  if a > 0 and b < 10 then
    return true
  end
  return false
end
check(1, 5)
check(1, 20)
";

/// A file large enough to exercise block/condition nesting: nested if,
/// while, repeat, numeric for, generic for, and a method declaration.
pub const NESTED_CONTROL_FLOW: &str = "\
local Counter = {}
Counter.__index = Counter

function Counter.new()
  local self = setmetatable({}, Counter)
  self.value = 0
  return self
end

function Counter:increment(step)
  while step > 0 do
    self.value = self.value + 1
    step = step - 1
  end
  return self.value
end

function Counter:reset_until_zero()
  repeat
    self.value = self.value - 1
  until self.value <= 0
end

local function sum_range(n)
  local total = 0
  for i = 1, n do
    if i % 2 == 0 then
      total = total + i
    else
      total = total - i
    end
  end
  return total
end

local function sum_table(t)
  local total = 0
  for _, v in ipairs(t) do
    total = total + v
  end
  return total
end

local c = Counter.new()
c:increment(3)
c:reset_until_zero()
sum_range(10)
sum_table({1, 2, 3})
";
